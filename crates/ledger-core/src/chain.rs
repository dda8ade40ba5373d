use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::{info, warn};

use crate::block::{Block, BlockPayload};
use crate::constants::{BLOCKS_PER_PAGE, MINING_REWARD};
use crate::pow;
use crate::wallet::Wallet;

/// First structural violation found in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidBlock {
    #[error("chain is empty")]
    Empty,

    #[error("block 0 is not the genesis block")]
    BadGenesis,

    #[error("block {index}: lastHash does not match the previous block")]
    BrokenLink { index: usize },

    #[error("block {index}: difficulty jumped from {previous} to {current}")]
    DifficultyJump {
        index: usize,
        previous: u32,
        current: u32,
    },

    #[error("block {index}: difficulty is below 1")]
    DifficultyTooLow { index: usize },

    #[error("block {index}: hash does not match block contents")]
    HashMismatch { index: usize },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: usize, difficulty: u32 },
}

/// First transaction-level violation found in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransactionData {
    #[error("block {block}: more than one mining reward")]
    ExtraReward { block: usize },

    #[error("block {block}: mining reward pays {paid:?}, expected {expected}")]
    WrongReward {
        block: usize,
        paid: Vec<u64>,
        expected: u64,
    },

    #[error("block {block}: transaction {id} is invalid")]
    InvalidTransaction { block: usize, id: String },

    #[error("block {block}: transaction {id} claims input {claimed}, balance is {actual}")]
    InputAmountMismatch {
        block: usize,
        id: String,
        claimed: u64,
        actual: u64,
    },

    #[error("block {block}: transaction {id} appears more than once")]
    DuplicateTransaction { block: usize, id: String },
}

/// Why an incoming chain was not adopted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("incoming chain of length {incoming} is not longer than {current}")]
    NotLonger { incoming: usize, current: usize },

    #[error("incoming chain is invalid: {0}")]
    InvalidChain(#[from] InvalidBlock),

    #[error("incoming chain has invalid transaction data: {0}")]
    InvalidTransactionData(#[from] InvalidTransactionData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced { old_chain: Vec<Block> },
    Rejected { reason: ChainError },
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplaceOutcome::Replaced { .. })
    }
}

/// Ordered blocks rooted at [`Block::genesis`]. Never empty.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Blockchain {
    chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    /// Mine `data` on top of the tip and append it.
    pub fn add_block(&mut self, data: BlockPayload) -> &Block {
        let block = Block::mine_block(self.last_block(), data);
        info!(
            "appended block {} with hash {} (difficulty {})",
            self.chain.len(),
            block.hash,
            block.difficulty
        );
        self.chain.push(block);
        self.last_block()
    }

    /// Append a block mined elsewhere against the current tip. Returns false,
    /// leaving the chain alone, if the tip has moved on or the block does not
    /// check out.
    pub fn push_mined(&mut self, block: Block) -> bool {
        let last = self.last_block();
        if block.last_hash != last.hash {
            warn!("discarding stale block {}: tip has moved", block.hash);
            return false;
        }
        if let Err(err) = check_successor(last, &block, self.chain.len()) {
            warn!("discarding mined block: {err}");
            return false;
        }
        info!(
            "appended block {} with hash {} (difficulty {})",
            self.chain.len(),
            block.hash,
            block.difficulty
        );
        self.chain.push(block);
        true
    }

    /// Reports the first structural violation in `chain`.
    pub fn check_chain(chain: &[Block]) -> Result<(), InvalidBlock> {
        let genesis = chain.first().ok_or(InvalidBlock::Empty)?;
        if *genesis != Block::genesis() {
            return Err(InvalidBlock::BadGenesis);
        }

        for (index, pair) in chain.windows(2).enumerate() {
            check_successor(&pair[0], &pair[1], index + 1)?;
        }
        Ok(())
    }

    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Self::check_chain(chain).is_ok()
    }

    /// Adopt `candidate` if it is strictly longer and valid (and, when asked,
    /// its transactions check out against the current chain). Rejections are
    /// logged and leave the chain untouched.
    pub fn replace_chain(
        &mut self,
        candidate: Vec<Block>,
        validate_transactions: bool,
    ) -> ReplaceOutcome {
        match self.check_candidate(&candidate, validate_transactions) {
            Ok(()) => {
                info!(
                    "replacing chain of length {} with length {}",
                    self.chain.len(),
                    candidate.len()
                );
                let old_chain = std::mem::replace(&mut self.chain, candidate);
                ReplaceOutcome::Replaced { old_chain }
            }
            Err(reason) => {
                warn!("rejected incoming chain: {reason}");
                ReplaceOutcome::Rejected { reason }
            }
        }
    }

    fn check_candidate(
        &self,
        candidate: &[Block],
        validate_transactions: bool,
    ) -> Result<(), ChainError> {
        if candidate.len() <= self.chain.len() {
            return Err(ChainError::NotLonger {
                incoming: candidate.len(),
                current: self.chain.len(),
            });
        }
        Self::check_chain(candidate)?;
        if validate_transactions {
            self.check_transaction_data(candidate)?;
        }
        Ok(())
    }

    /// Per block: at most one reward paying exactly [`MINING_REWARD`]; every
    /// other transaction valid, claiming the balance this (local) chain gives
    /// its sender, and included once.
    pub fn check_transaction_data(&self, chain: &[Block]) -> Result<(), InvalidTransactionData> {
        for (block_index, block) in chain.iter().enumerate() {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut rewards = 0usize;

            for tx in block.transactions() {
                if tx.is_reward() {
                    rewards += 1;
                    if rewards > 1 {
                        return Err(InvalidTransactionData::ExtraReward { block: block_index });
                    }

                    let paid: Vec<u64> = tx.output_map.values().copied().collect();
                    if paid != [MINING_REWARD] {
                        return Err(InvalidTransactionData::WrongReward {
                            block: block_index,
                            paid,
                            expected: MINING_REWARD,
                        });
                    }
                    continue;
                }

                if !tx.is_valid() {
                    return Err(InvalidTransactionData::InvalidTransaction {
                        block: block_index,
                        id: tx.id.clone(),
                    });
                }

                let actual = Wallet::calculate_balance(&self.chain, &tx.input.address);
                if tx.input.amount != actual {
                    return Err(InvalidTransactionData::InputAmountMismatch {
                        block: block_index,
                        id: tx.id.clone(),
                        claimed: tx.input.amount,
                        actual,
                    });
                }

                if !seen.insert(tx.id.as_str()) {
                    return Err(InvalidTransactionData::DuplicateTransaction {
                        block: block_index,
                        id: tx.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn valid_transaction_data(&self, chain: &[Block]) -> bool {
        match self.check_transaction_data(chain) {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}");
                false
            }
        }
    }

    /// 1-based page of [`BLOCKS_PER_PAGE`] blocks, newest first. Page 0 reads
    /// as page 1; pages past the end are empty.
    pub fn blocks_page(&self, page: usize) -> Vec<&Block> {
        let start = page.max(1).saturating_sub(1).saturating_mul(BLOCKS_PER_PAGE);
        self.chain
            .iter()
            .rev()
            .skip(start)
            .take(BLOCKS_PER_PAGE)
            .collect()
    }

    /// Every address paid by any transaction on the chain.
    pub fn known_addresses(&self) -> Vec<String> {
        self.chain
            .iter()
            .flat_map(|block| block.transactions())
            .flat_map(|tx| tx.output_map.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn check_successor(previous: &Block, block: &Block, index: usize) -> Result<(), InvalidBlock> {
    if block.last_hash != previous.hash {
        return Err(InvalidBlock::BrokenLink { index });
    }
    if block.difficulty < 1 {
        return Err(InvalidBlock::DifficultyTooLow { index });
    }
    if block.difficulty.abs_diff(previous.difficulty) > 1 {
        return Err(InvalidBlock::DifficultyJump {
            index,
            previous: previous.difficulty,
            current: block.difficulty,
        });
    }
    if block.hash != block.recompute_hash() {
        return Err(InvalidBlock::HashMismatch { index });
    }
    if !pow::meets_difficulty(&block.hash, block.difficulty) {
        return Err(InvalidBlock::InsufficientWork {
            index,
            difficulty: block.difficulty,
        });
    }
    Ok(())
}
