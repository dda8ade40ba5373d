use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::block::Block;
use crate::transaction::Transaction;

/// Pending transactions keyed by id, remembered in insertion order.
#[derive(Debug, Default, Clone)]
pub struct TransactionPool {
    transaction_map: HashMap<String, Transaction>,
    order: Vec<String>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transaction_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_map.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transaction_map.get(id)
    }

    pub fn transaction_map(&self) -> &HashMap<String, Transaction> {
        &self.transaction_map
    }

    /// Transactions in insertion order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.order.iter().filter_map(|id| self.transaction_map.get(id))
    }

    /// Insert, or overwrite the entry with the same id in place.
    pub fn set_transaction(&mut self, tx: Transaction) {
        let id = tx.id.clone();
        if self.transaction_map.insert(id.clone(), tx).is_none() {
            self.order.push(id);
        }
    }

    /// Replace the whole pool, e.g. with a root node's map.
    pub fn set_map(&mut self, transaction_map: HashMap<String, Transaction>) {
        self.order = transaction_map.keys().cloned().collect();
        self.transaction_map = transaction_map;
    }

    /// First pooled transaction sent from `input_address`.
    pub fn existing_transaction(&self, input_address: &str) -> Option<&Transaction> {
        self.transactions()
            .find(|tx| tx.input.address == input_address)
    }

    /// Pooled transactions that pass [`Transaction::is_valid`]. Invalid ones
    /// stay in the pool.
    pub fn valid_transactions(&self) -> Vec<Transaction> {
        self.transactions()
            .filter(|tx| tx.is_valid())
            .cloned()
            .collect()
    }

    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let removed = self.transaction_map.remove(id)?;
        self.order.retain(|kept| kept != id);
        Some(removed)
    }

    /// Drop every entry that fails [`Transaction::is_valid`]; returns how many.
    pub fn evict_invalid(&mut self) -> usize {
        let invalid: Vec<String> = self
            .transactions()
            .filter(|tx| !tx.is_valid())
            .map(|tx| tx.id.clone())
            .collect();
        for id in &invalid {
            self.remove(id);
        }
        if !invalid.is_empty() {
            debug!("evicted {} invalid transactions from the pool", invalid.len());
        }
        invalid.len()
    }

    pub fn clear(&mut self) {
        self.transaction_map.clear();
        self.order.clear();
    }

    /// Drop every pooled transaction that `chain` already includes.
    pub fn clear_blockchain_transactions(&mut self, chain: &[Block]) {
        let settled: HashSet<&str> = chain
            .iter()
            .flat_map(|block| block.transactions())
            .map(|tx| tx.id.as_str())
            .collect();

        let before = self.len();
        self.transaction_map.retain(|id, _| !settled.contains(id.as_str()));
        self.order.retain(|id| !settled.contains(id.as_str()));
        debug!("purged {} settled transactions from the pool", before - self.len());
    }
}
