use serde::Serialize;

use crate::block::Block;
use crate::constants::STARTING_BALANCE;
use crate::crypto::KeyPair;
use crate::transaction::{Transaction, TransactionError};

/// A keypair plus the balance cached from the last balance query.
#[derive(Debug, Clone)]
pub struct Wallet {
    keys: KeyPair,
    address: String,
    balance: u64,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    pub fn new() -> Self {
        let keys = KeyPair::generate();
        let address = keys.address();
        Self {
            keys,
            address,
            balance: STARTING_BALANCE,
        }
    }

    /// Public key hex; doubles as the wallet's address.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Signs the hash of `data`.
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> String {
        self.keys.sign(data)
    }

    /// Recomputes and caches the balance from `chain`.
    pub fn refresh_balance(&mut self, chain: &[Block]) -> u64 {
        self.balance = Self::calculate_balance(chain, &self.address);
        self.balance
    }

    /// Builds a transaction to `recipient`. With a chain, the balance is
    /// derived from it first.
    pub fn create_transaction(
        &mut self,
        recipient: &str,
        amount: u64,
        chain: Option<&[Block]>,
    ) -> Result<Transaction, TransactionError> {
        if let Some(chain) = chain {
            self.refresh_balance(chain);
        }

        if amount > self.balance {
            return Err(TransactionError::AmountExceedsBalance {
                amount,
                balance: self.balance,
            });
        }

        Transaction::new(self, recipient, amount)
    }

    /// Balance of `address` derived from transaction outputs.
    ///
    /// Blocks are scanned newest first. Every output paid to `address` is
    /// summed until the first block in which `address` is a sender; that
    /// block is still counted in full and the scan stops after it. Only
    /// addresses that never sent anything get [`STARTING_BALANCE`] on top.
    pub fn calculate_balance(chain: &[Block], address: &str) -> u64 {
        let mut has_transacted = false;
        let mut outputs_total = 0u64;

        for block in chain.iter().rev() {
            for tx in block.transactions() {
                if tx.input.address == address {
                    has_transacted = true;
                }
                if let Some(amount) = tx.output_map.get(address) {
                    outputs_total = outputs_total.saturating_add(*amount);
                }
            }
            if has_transacted {
                break;
            }
        }

        if has_transacted {
            outputs_total
        } else {
            STARTING_BALANCE.saturating_add(outputs_total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Blockchain;
    use crate::crypto::verify_signature;

    #[test]
    fn starts_with_starting_balance() {
        let wallet = Wallet::new();
        assert_eq!(wallet.balance(), STARTING_BALANCE);
        assert!(!wallet.address().is_empty());
    }

    #[test]
    fn signature_verifies_against_address() {
        let wallet = Wallet::new();
        let sig = wallet.sign("foobar");
        assert!(verify_signature(wallet.address(), "foobar", &sig));
        assert!(!verify_signature(Wallet::new().address(), "foobar", &sig));
    }

    #[test]
    fn create_transaction_over_balance_fails() {
        let mut wallet = Wallet::new();
        let err = wallet
            .create_transaction("foo-recipient", 999_999, None)
            .unwrap_err();
        assert!(matches!(err, TransactionError::AmountExceedsBalance { .. }));
    }

    #[test]
    fn create_transaction_within_balance() {
        let mut wallet = Wallet::new();
        let tx = wallet.create_transaction("foo-recipient", 50, None).unwrap();
        assert_eq!(tx.input.address, wallet.address());
        assert_eq!(tx.output_map["foo-recipient"], 50);
    }

    #[test]
    fn create_transaction_uses_chain_balance() {
        let mut blockchain = Blockchain::new();
        let mut wallet = Wallet::new();
        let mut other = Wallet::new();

        // `other` pays `wallet`, lifting its derived balance above the cache.
        let tx = other
            .create_transaction(wallet.address(), 500, Some(blockchain.blocks()))
            .unwrap();
        blockchain.add_block(vec![tx].into());

        let tx = wallet
            .create_transaction("foo", STARTING_BALANCE + 100, Some(blockchain.blocks()))
            .unwrap();
        assert_eq!(wallet.balance(), STARTING_BALANCE + 500);
        assert_eq!(tx.input.amount, STARTING_BALANCE + 500);
    }

    #[test]
    fn fresh_address_has_starting_balance() {
        let blockchain = Blockchain::new();
        let wallet = Wallet::new();
        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            STARTING_BALANCE
        );
    }

    #[test]
    fn received_outputs_add_to_starting_balance() {
        let mut blockchain = Blockchain::new();
        let wallet = Wallet::new();
        let mut a = Wallet::new();
        let mut b = Wallet::new();

        let tx_one = a.create_transaction(wallet.address(), 50, None).unwrap();
        let tx_two = b.create_transaction(wallet.address(), 60, None).unwrap();
        blockchain.add_block(vec![tx_one, tx_two].into());

        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            STARTING_BALANCE + 50 + 60
        );
    }

    #[test]
    fn balance_after_spending_is_latest_change() {
        let mut blockchain = Blockchain::new();
        let mut wallet = Wallet::new();

        let spend = wallet.create_transaction("foo", 30, None).unwrap();
        blockchain.add_block(vec![spend.clone()].into());

        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            spend.output_map[wallet.address()]
        );
    }

    #[test]
    fn outputs_next_to_and_after_own_spend_count() {
        let mut blockchain = Blockchain::new();
        let mut wallet = Wallet::new();
        let mut payer = Wallet::new();

        let spend = wallet.create_transaction("foo", 30, None).unwrap();
        let same_block_reward = Transaction::reward(&wallet);
        blockchain.add_block(vec![spend.clone(), same_block_reward].into());

        let later = payer.create_transaction(wallet.address(), 75, None).unwrap();
        blockchain.add_block(vec![later].into());

        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            spend.output_map[wallet.address()] + crate::constants::MINING_REWARD + 75
        );
    }

    #[test]
    fn outputs_before_own_spend_are_ignored() {
        let mut blockchain = Blockchain::new();
        let mut wallet = Wallet::new();
        let mut payer = Wallet::new();

        let earlier = payer.create_transaction(wallet.address(), 75, None).unwrap();
        blockchain.add_block(vec![earlier].into());

        let spend = wallet
            .create_transaction("foo", 30, Some(blockchain.blocks()))
            .unwrap();
        blockchain.add_block(vec![spend.clone()].into());

        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            spend.output_map[wallet.address()]
        );
        assert_eq!(spend.output_map[wallet.address()], STARTING_BALANCE + 75 - 30);
    }

    #[test]
    fn raw_blocks_are_skipped() {
        let mut blockchain = Blockchain::new();
        blockchain.add_block("just data".into());
        let wallet = Wallet::new();
        assert_eq!(
            Wallet::calculate_balance(blockchain.blocks(), wallet.address()),
            STARTING_BALANCE
        );
    }
}
