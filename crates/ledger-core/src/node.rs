//! One node's state: its chain, mempool and wallet, and the operations the
//! request layer and the broadcast transport drive.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::block::{Block, BlockPayload};
use crate::chain::{Blockchain, ReplaceOutcome};
use crate::codec::{self, CodecError};
use crate::pool::TransactionPool;
use crate::transaction::{Transaction, TransactionError};
use crate::wallet::Wallet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Default)]
pub struct Node {
    blockchain: Blockchain,
    pool: TransactionPool,
    wallet: Wallet,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(wallet: Wallet) -> Self {
        Self {
            blockchain: Blockchain::new(),
            pool: TransactionPool::new(),
            wallet,
        }
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Mine free-form data onto the chain.
    pub fn mine(&mut self, data: String) -> &Block {
        self.blockchain.add_block(BlockPayload::Raw(data))
    }

    /// Valid pool transactions plus this wallet's reward.
    pub fn pending_block_data(&self) -> BlockPayload {
        let mut txs = self.pool.valid_transactions();
        txs.push(Transaction::reward(&self.wallet));
        BlockPayload::Transactions(txs)
    }

    /// Mine the pending transactions in place and empty the pool.
    pub fn mine_transactions(&mut self) -> Block {
        let data = self.pending_block_data();
        let block = self.blockchain.add_block(data).clone();
        self.pool.clear();
        block
    }

    /// Append a block mined off-lock by a worker. Stale or bad blocks are
    /// dropped. On success the pool forgets the transactions it settled and
    /// any that no longer validate.
    pub fn submit_mined(&mut self, block: Block) -> bool {
        let included = [block.clone()];
        if !self.blockchain.push_mined(block) {
            return false;
        }
        self.pool.clear_blockchain_transactions(&included);
        self.pool.evict_invalid();
        true
    }

    /// Pay `recipient` from this node's wallet, folding into the wallet's
    /// in-flight pool transaction when there is one.
    pub fn transact(&mut self, recipient: &str, amount: u64) -> Result<Transaction, TransactionError> {
        let existing = self
            .pool
            .existing_transaction(self.wallet.address())
            .cloned();

        let tx = match existing {
            Some(mut tx) if tx.is_valid() => {
                tx.update(&self.wallet, recipient, amount)?;
                tx
            }
            unusable => {
                // Never sign over an entry this wallet did not produce.
                if let Some(forged) = unusable {
                    warn!("dropping unverifiable pool entry {} claiming our address", forged.id);
                    self.pool.remove(&forged.id);
                }
                self.wallet.create_transaction(
                    recipient,
                    amount,
                    Some(self.blockchain.blocks()),
                )?
            }
        };

        self.pool.set_transaction(tx.clone());
        Ok(tx)
    }

    /// Swap in a peer's chain if it wins, purging settled transactions from
    /// the pool in the same step.
    pub fn apply_chain(&mut self, candidate: Vec<Block>) -> ReplaceOutcome {
        let outcome = self.blockchain.replace_chain(candidate, true);
        if outcome.is_replaced() {
            self.pool
                .clear_blockchain_transactions(self.blockchain.blocks());
        }
        outcome
    }

    /// Chain payload from the broadcast transport.
    pub fn receive_chain(&mut self, bytes: &[u8]) -> Result<ReplaceOutcome, CodecError> {
        let candidate = codec::decode_chain(bytes)?;
        Ok(self.apply_chain(candidate))
    }

    /// Startup sync from a root node. The root's history is taken on
    /// structure alone: its balances cannot be checked against a chain that
    /// only holds genesis.
    pub fn sync_chain(&mut self, bytes: &[u8]) -> Result<ReplaceOutcome, CodecError> {
        let candidate = codec::decode_chain(bytes)?;
        Ok(self.blockchain.replace_chain(candidate, false))
    }

    /// Transaction payload from the broadcast transport.
    pub fn receive_transaction(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let tx = codec::decode_transaction(bytes)?;
        info!("pooling transaction {} from {}", tx.id, tx.input.address);
        self.pool.set_transaction(tx);
        Ok(())
    }

    pub fn sync_pool(&mut self, transaction_map: HashMap<String, Transaction>) {
        info!("replacing pool with {} synced transactions", transaction_map.len());
        self.pool.set_map(transaction_map);
    }

    /// Derived balance of `address`, or of this node's wallet.
    pub fn wallet_info(&self, address: Option<&str>) -> WalletInfo {
        let address = address.unwrap_or(self.wallet.address());
        WalletInfo {
            address: address.to_owned(),
            balance: Wallet::calculate_balance(self.blockchain.blocks(), address),
        }
    }

    pub fn encode_chain(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_chain(self.blockchain.blocks())
    }

    pub fn encode_pool(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_pool_map(self.pool.transaction_map())
    }
}
