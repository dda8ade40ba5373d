use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod block;
pub mod chain;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod mine;
pub mod node;
pub mod pool;
pub mod transaction;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_support;

pub use block::{Block, BlockPayload};
pub use chain::{Blockchain, ChainError, InvalidBlock, InvalidTransactionData, ReplaceOutcome};
pub use codec::CodecError;
pub use mine::{CancelToken, MineHandle, Miner};
pub use node::{Node, WalletInfo};
pub use pool::TransactionPool;
pub use transaction::{Input, OutputMap, Transaction, TransactionError};
pub use wallet::Wallet;

pub type Hash = [u8; 32];

/// JSON form of a single hash input.
pub fn hash_part<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).expect("hash inputs are plain serde data")
}

/// SHA-256 over the parts sorted lexicographically and joined with a space.
/// Input order does not affect the result.
pub fn digest<S: AsRef<str>>(parts: &[S]) -> Hash {
    let mut sorted: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(sorted.join(" ").as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Hex form of [`digest`].
pub fn crypto_hash<S: AsRef<str>>(parts: &[S]) -> String {
    hex::encode(digest(parts))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub mod pow {
    /// Leading zero bits of a raw digest.
    pub fn count_leading_zero_bits(hash: &[u8]) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    /// Leading `'0'` characters in the binary expansion of a hex digest.
    /// Anything that is not valid hex counts as zero.
    pub fn leading_zero_bits(hex_hash: &str) -> u32 {
        match hex::decode(hex_hash) {
            Ok(bytes) => count_leading_zero_bits(&bytes),
            Err(_) => 0,
        }
    }

    pub fn meets_difficulty(hex_hash: &str, difficulty: u32) -> bool {
        leading_zero_bits(hex_hash) >= difficulty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HASH_HEX_SIZE;

    #[test]
    fn leading_zero_bits_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::count_leading_zero_bits(&h), 256);
        h[0] = 0x0F; // 00001111
        assert_eq!(pow::count_leading_zero_bits(&h), 4);
        h = [0u8; 32];
        h[1] = 0x80; // 00000000 10000000
        assert_eq!(pow::count_leading_zero_bits(&h), 8);
        h[1] = 0x40; // 01000000
        assert_eq!(pow::count_leading_zero_bits(&h), 9);
    }

    #[test]
    fn leading_zero_bits_from_hex() {
        assert_eq!(pow::leading_zero_bits("ff"), 0);
        assert_eq!(pow::leading_zero_bits("1f"), 3);
        assert_eq!(pow::leading_zero_bits("00ff"), 8);
        assert_eq!(pow::leading_zero_bits("0080"), 8);
        assert_eq!(pow::leading_zero_bits("not-hex"), 0);
        assert!(pow::meets_difficulty("0fff", 4));
        assert!(!pow::meets_difficulty("0fff", 5));
    }

    #[test]
    fn crypto_hash_is_sha256_hex() {
        let hash = crypto_hash(&["foo"]);
        assert_eq!(hash.len(), HASH_HEX_SIZE);
        assert_eq!(
            hash,
            "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
        );
    }

    #[test]
    fn crypto_hash_ignores_input_order() {
        let a = crypto_hash(&[hash_part("one"), hash_part("two"), hash_part("three")]);
        let b = crypto_hash(&[hash_part("three"), hash_part("one"), hash_part("two")]);
        assert_eq!(a, b);
    }

    #[test]
    fn crypto_hash_changes_with_content() {
        let a = crypto_hash(&[hash_part(&1u64), hash_part("x")]);
        let b = crypto_hash(&[hash_part(&2u64), hash_part("x")]);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_part_quotes_strings() {
        assert_eq!(hash_part("foo"), "\"foo\"");
        assert_eq!(hash_part(&42u64), "42");
    }
}
