//! # Candidate Blocks
//!
//! A block travels as a JSON array of wire transactions. The last one is
//! the coinbase: signed by the miner, addressed to the miner, carrying the
//! nonce in its openfield and no amount.
//!
//! ```text
//! [ tx, tx, ..., [ts, miner, miner, "0.00000000", sig, pk, "0", nonce] ]
//!                 └──────────────────── coinbase ───────────────────┘
//! ```
//!
//! The block hash is SHA-224 over each transaction's signing payload and
//! signature, in block order, followed by the previous block hash.

use serde_json::Value;
use shared_crypto::sha224_hex;
use shared_types::{Timestamp, Transaction, TypesError};

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    /// Parse the wire array of a block.
    pub fn from_wire(value: &Value) -> Result<Self, TypesError> {
        let items = value
            .as_array()
            .ok_or_else(|| TypesError::InvalidFormat("block is not an array".into()))?;
        let transactions = items
            .iter()
            .map(Transaction::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { transactions })
    }

    pub fn to_wire(&self) -> Value {
        Value::Array(self.transactions.iter().map(Transaction::to_wire).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    /// Everything but the coinbase.
    pub fn user_transactions(&self) -> &[Transaction] {
        match self.transactions.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn miner(&self) -> Option<&str> {
        self.coinbase().map(|tx| tx.address.as_str())
    }

    pub fn nonce(&self) -> Option<&str> {
        self.coinbase().map(|tx| tx.openfield.as_str())
    }

    /// Block time, taken from the coinbase.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.coinbase().map(|tx| tx.timestamp)
    }

    pub fn hash(&self, prev_hash: &str) -> String {
        let mut input = String::new();
        for tx in &self.transactions {
            input.push_str(&tx.signing_payload());
            input.push_str(&tx.signature);
        }
        input.push_str(prev_hash);
        sha224_hex(input.as_bytes())
    }
}
