use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MINE_RATE_MS,
};
use crate::transaction::Transaction;
use crate::{crypto_hash, hash_part, now_millis, pow};

/// What a block carries: free-form data or a list of transactions.
/// Serialized untagged, so it reads as a JSON string or array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockPayload {
    Raw(String),
    Transactions(Vec<Transaction>),
}

impl BlockPayload {
    /// Transactions in the payload; empty for raw data.
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            BlockPayload::Transactions(txs) => txs,
            BlockPayload::Raw(_) => &[],
        }
    }
}

impl Default for BlockPayload {
    fn default() -> Self {
        BlockPayload::Raw(String::new())
    }
}

impl From<String> for BlockPayload {
    fn from(data: String) -> Self {
        BlockPayload::Raw(data)
    }
}

impl From<&str> for BlockPayload {
    fn from(data: &str) -> Self {
        BlockPayload::Raw(data.to_owned())
    }
}

impl From<Vec<Transaction>> for BlockPayload {
    fn from(txs: Vec<Transaction>) -> Self {
        BlockPayload::Transactions(txs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: u64,
    pub last_hash: String,
    pub hash: String,
    pub data: BlockPayload,
    pub nonce: u64,
    pub difficulty: u32,
}

impl Block {
    /// The fixed root every chain starts from.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_owned(),
            hash: GENESIS_HASH.to_owned(),
            data: BlockPayload::default(),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    pub fn compute_hash(
        timestamp: u64,
        last_hash: &str,
        data: &BlockPayload,
        nonce: u64,
        difficulty: u32,
    ) -> String {
        hash_fields(timestamp, last_hash, &hash_part(data), nonce, difficulty)
    }

    /// Hash recomputed from this block's own fields.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.data.transactions()
    }

    /// One step of retargeting relative to `last_block`: up when the block came
    /// faster than [`MINE_RATE_MS`], down otherwise, never below 1.
    pub fn adjust_difficulty(last_block: &Block, timestamp: u64) -> u32 {
        if last_block.difficulty < 1 {
            return 1;
        }
        if timestamp.saturating_sub(last_block.timestamp) > MINE_RATE_MS {
            return (last_block.difficulty - 1).max(1);
        }
        last_block.difficulty + 1
    }

    /// Search nonces from 1 upward until the hash carries the required number
    /// of leading zero bits. Runs until it finds one.
    pub fn mine_block(last_block: &Block, data: BlockPayload) -> Block {
        let search = Search::new(last_block, &data);
        let mut nonce = 0u64;
        loop {
            nonce = nonce.wrapping_add(1);
            if let Some(found) = search.attempt(nonce) {
                debug!(
                    "mined block at difficulty {} with nonce {}",
                    found.difficulty, nonce
                );
                return found.into_block(last_block, data);
            }
        }
    }
}

fn hash_fields(timestamp: u64, last_hash: &str, data_part: &str, nonce: u64, difficulty: u32) -> String {
    crypto_hash(&[
        hash_part(&timestamp),
        hash_part(last_hash),
        data_part.to_owned(),
        hash_part(&nonce),
        hash_part(&difficulty),
    ])
}

/// Fixed inputs of a nonce search. The payload is encoded once up front.
pub(crate) struct Search<'a> {
    last_block: &'a Block,
    data_part: String,
}

pub(crate) struct Found {
    pub timestamp: u64,
    pub nonce: u64,
    pub difficulty: u32,
    pub hash: String,
}

impl Found {
    pub fn into_block(self, last_block: &Block, data: BlockPayload) -> Block {
        Block {
            timestamp: self.timestamp,
            last_hash: last_block.hash.clone(),
            hash: self.hash,
            data,
            nonce: self.nonce,
            difficulty: self.difficulty,
        }
    }
}

impl<'a> Search<'a> {
    pub fn new(last_block: &'a Block, data: &BlockPayload) -> Self {
        Self {
            last_block,
            data_part: hash_part(data),
        }
    }

    /// Tries one nonce at the current time.
    pub fn attempt(&self, nonce: u64) -> Option<Found> {
        let timestamp = now_millis();
        let difficulty = Block::adjust_difficulty(self.last_block, timestamp);
        let hash = hash_fields(
            timestamp,
            &self.last_block.hash,
            &self.data_part,
            nonce,
            difficulty,
        );
        pow::meets_difficulty(&hash, difficulty).then_some(Found {
            timestamp,
            nonce,
            difficulty,
            hash,
        })
    }
}
