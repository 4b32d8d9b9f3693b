//! # Ledger Rows
//!
//! Persisted form of a transaction once it is part of a block.
//!
//! Rows that share a `block_height` belong to one block. Synthetic reward
//! rows (development and hypernode payouts) are stored at the negated
//! height of the block that produced them.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::time::Timestamp;
use crate::transaction::{format_timestamp, Transaction};

/// Block height; negative for synthetic reward rows.
pub type BlockHeight = i64;

/// A transaction as stored in the ledger tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub block_height: BlockHeight,
    pub timestamp: Timestamp,
    pub address: String,
    pub recipient: String,
    pub amount: Amount,
    pub signature: String,
    pub public_key: String,
    pub block_hash: String,
    pub fee: Amount,
    pub reward: Amount,
    pub operation: String,
    pub openfield: String,
}

impl LedgerRow {
    /// Wrap a mined transaction.
    pub fn from_transaction(
        tx: &Transaction,
        block_height: BlockHeight,
        block_hash: &str,
        fee: Amount,
        reward: Amount,
    ) -> Self {
        Self {
            block_height,
            timestamp: tx.timestamp,
            address: tx.address.clone(),
            recipient: tx.recipient.clone(),
            amount: tx.amount,
            signature: tx.signature.clone(),
            public_key: tx.public_key.clone(),
            block_hash: block_hash.to_string(),
            fee,
            reward,
            operation: tx.operation.clone(),
            openfield: tx.openfield.clone(),
        }
    }

    /// Synthetic payout row with no signature.
    pub fn reward_row(
        block_height: BlockHeight,
        timestamp: Timestamp,
        label: &str,
        recipient: &str,
        amount: Amount,
        block_hash: &str,
    ) -> Self {
        Self {
            block_height: -block_height.abs(),
            timestamp,
            address: label.to_string(),
            recipient: recipient.to_string(),
            amount,
            signature: "0".into(),
            public_key: "0".into(),
            block_hash: block_hash.to_string(),
            fee: Amount::ZERO,
            reward: Amount::ZERO,
            operation: "0".into(),
            openfield: "0".into(),
        }
    }

    /// True for the coinbase row that closes a block.
    pub fn is_reward(&self) -> bool {
        self.reward != Amount::ZERO
    }

    /// Timestamp as persisted (two decimals).
    pub fn timestamp_string(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// The user transaction this row carries.
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            timestamp: self.timestamp,
            address: self.address.clone(),
            recipient: self.recipient.clone(),
            amount: self.amount,
            signature: self.signature.clone(),
            public_key: self.public_key.clone(),
            operation: self.operation.clone(),
            openfield: self.openfield.clone(),
        }
    }
}

/// Difficulty recorded for a block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyRecord {
    pub block_height: BlockHeight,
    pub difficulty: f64,
}
