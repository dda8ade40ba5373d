//! JSON wire format shared with the broadcast transport and peers.

use std::collections::HashMap;
use thiserror::Error;

use crate::block::Block;
use crate::transaction::Transaction;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode_chain(chain: &[Block]) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(chain)?)
}

pub fn decode_chain(bytes: &[u8]) -> Result<Vec<Block>, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_transaction(tx: &Transaction) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(tx)?)
}

pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn encode_pool_map(map: &HashMap<String, Transaction>) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(map)?)
}

pub fn decode_pool_map(bytes: &[u8]) -> Result<HashMap<String, Transaction>, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Blockchain;
    use crate::wallet::Wallet;

    #[test]
    fn chain_survives_the_wire() {
        let mut blockchain = Blockchain::new();
        let mut wallet = Wallet::new();
        let tx = wallet.create_transaction("bob", 5, None).unwrap();
        blockchain.add_block("raw".into());
        blockchain.add_block(vec![tx, crate::Transaction::reward(&wallet)].into());

        let bytes = encode_chain(blockchain.blocks()).unwrap();
        let decoded = decode_chain(&bytes).unwrap();
        assert_eq!(decoded, blockchain.blocks());
        assert!(Blockchain::is_valid_chain(&decoded));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_chain(b"not json").is_err());
        assert!(decode_transaction(b"{\"id\": 1}").is_err());
        assert!(decode_pool_map(b"[]").is_err());
    }
}
