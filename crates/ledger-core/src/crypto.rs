//! secp256k1 keys and ECDSA signatures over [`crate::digest`] of JSON data.
//!
//! An address is the hex of the compressed public key, so any address can be
//! turned back into a verifying key without a lookup.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{digest, hash_part, Hash};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid public key hex")]
    PublicKeyHex,
    #[error("invalid public key bytes")]
    PublicKeyBytes,
    #[error("invalid signature hex")]
    SignatureHex,
    #[error("invalid DER signature")]
    SignatureDer,
}

#[derive(Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Hex of the compressed (33 byte) public key.
    pub fn address(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Hex DER signature of `data`'s digest.
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> String {
        self.sign_digest(data_digest(data))
    }

    pub fn sign_digest(&self, msg32: Hash) -> String {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(msg32);
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        hex::encode(&*sig.serialize_der())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Digest that gets signed for `data`.
pub fn data_digest<T: Serialize + ?Sized>(data: &T) -> Hash {
    digest(&[hash_part(data)])
}

/// Checks `signature` (hex DER) by `address` over `data`. Malformed keys or
/// signatures verify as false.
pub fn verify_signature<T: Serialize + ?Sized>(address: &str, data: &T, signature: &str) -> bool {
    match verify_signature_hex(address, signature, data_digest(data)) {
        Ok(valid) => valid,
        Err(err) => {
            debug!("signature check failed for {address}: {err}");
            false
        }
    }
}

/// Verify a signature (hex DER) against the given pubkey (hex, compressed) and message hash.
pub fn verify_signature_hex(
    pubkey_hex: &str,
    sig_hex: &str,
    msg32: Hash,
) -> Result<bool, SignatureError> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| SignatureError::SignatureHex)?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| SignatureError::SignatureDer)?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| SignatureError::PublicKeyHex)?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| SignatureError::PublicKeyBytes)?;

    let msg = Message::from_digest(msg32);
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
