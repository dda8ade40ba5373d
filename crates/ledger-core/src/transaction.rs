use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::constants::{MINING_REWARD, REWARD_INPUT_ADDRESS};
use crate::crypto::verify_signature;
use crate::now_millis;
use crate::wallet::Wallet;

/// Recipient address to amount. Ordered so the signed JSON is stable.
pub type OutputMap = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("amount {amount} exceeds balance {balance}")]
    AmountExceedsBalance { amount: u64, balance: u64 },

    #[error("wallet {wallet} did not send transaction {id}")]
    SenderMismatch { wallet: String, id: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub timestamp: u64,
    /// Sender balance when the transaction was last signed.
    pub amount: u64,
    pub address: String,
    /// Hex DER signature over the output map.
    pub signature: String,
}

impl Input {
    fn signed(sender: &Wallet, output_map: &OutputMap) -> Self {
        Self {
            timestamp: now_millis(),
            amount: sender.balance(),
            address: sender.address().to_owned(),
            signature: sender.sign(output_map),
        }
    }

    /// Sentinel input of a mining reward.
    pub fn reward() -> Self {
        Self {
            timestamp: 0,
            amount: MINING_REWARD,
            address: REWARD_INPUT_ADDRESS.to_owned(),
            signature: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub output_map: OutputMap,
    pub input: Input,
}

impl Transaction {
    /// Sends `amount` to `recipient` and returns the rest of the sender's
    /// cached balance to the sender.
    pub fn new(sender: &Wallet, recipient: &str, amount: u64) -> Result<Self, TransactionError> {
        let balance = sender.balance();
        if amount > balance {
            return Err(TransactionError::AmountExceedsBalance { amount, balance });
        }

        let mut output_map = OutputMap::new();
        output_map.insert(recipient.to_owned(), amount);
        output_map.insert(sender.address().to_owned(), balance - amount);

        let input = Input::signed(sender, &output_map);
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            output_map,
            input,
        })
    }

    /// Adds another payment to a transaction that has not been broadcast yet.
    /// The amount is checked against the sender's remaining change, and the
    /// input is signed again. The id is kept.
    pub fn update(
        &mut self,
        sender: &Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<(), TransactionError> {
        if self.input.address != sender.address() {
            return Err(TransactionError::SenderMismatch {
                wallet: sender.address().to_owned(),
                id: self.id.clone(),
            });
        }

        let change = self
            .output_map
            .get(sender.address())
            .copied()
            .unwrap_or_default();
        if amount > change {
            return Err(TransactionError::AmountExceedsBalance {
                amount,
                balance: change,
            });
        }

        *self.output_map.entry(recipient.to_owned()).or_default() += amount;
        if let Some(change) = self.output_map.get_mut(sender.address()) {
            *change -= amount;
        }

        self.input = Input::signed(sender, &self.output_map);
        Ok(())
    }

    /// Outputs add up to the input amount and the input signature covers the
    /// output map.
    pub fn is_valid(&self) -> bool {
        let Input {
            address,
            amount,
            signature,
            ..
        } = &self.input;

        let total = self
            .output_map
            .values()
            .try_fold(0u64, |acc, v| acc.checked_add(*v));
        if total != Some(*amount) {
            warn!("invalid transaction {} from {address}: outputs do not add up", self.id);
            return false;
        }

        if !verify_signature(address, &self.output_map, signature) {
            warn!("invalid signature on transaction {} from {address}", self.id);
            return false;
        }

        true
    }

    /// Pays [`MINING_REWARD`] to the miner. Not signed.
    pub fn reward(miner: &Wallet) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            output_map: OutputMap::from([(miner.address().to_owned(), MINING_REWARD)]),
            input: Input::reward(),
        }
    }

    pub fn is_reward(&self) -> bool {
        self.input.address == REWARD_INPUT_ADDRESS
    }
}
