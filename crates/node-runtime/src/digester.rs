//! # Block Digestion
//!
//! Moves a mined block into the ledger, and undoes blocks on a reorg.
//! Both hold the digestion lock from start to end, so no mempool merge
//! can interleave with them.
//!
//! ## Digest
//!
//! | Step | Check / effect |
//! |------|----------------|
//! | 1 | block is not empty; coinbase carries no amount |
//! | 2 | coinbase is newer than the last block and not in the future |
//! | 3 | every transaction is signed, not negative, not newer than the block |
//! | 4 | no signature twice in the block or already in the ledger |
//! | 5 | each sender's ledger balance covers its debits in the block |
//! | 6 | nonce meets the difficulty on top of the previous hash |
//! | 7 | append rows, coinbase reward (mining reward + fees) and development reward |
//! | 8 | index update, mempool removal, flush |
//!
//! ## Rollback
//!
//! Rows at or above the rollback height leave every tier and the index;
//! their user transactions go back to the mempool, past triage.

use std::collections::{HashMap, HashSet};

use ln_01_proof_of_work::{PowRejection, PowVerdict, INITIAL_DIFFICULTY};
use ln_02_ledger_store::{BalanceBatch, FlushReport, StorageError};
use serde_json::Value;
use shared_crypto::verify_encoded;
use shared_types::{
    Amount, BlockHeight, FeeSchedule, LedgerRow, Timestamp, Transaction, TypesError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::block::Block;
use crate::context::NodeContext;

/// Label of the synthetic development reward row.
pub const DEVELOPMENT_REWARD: &str = "Development Reward";

/// Why a block was not digested.
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Block is empty")]
    EmptyBlock,

    #[error("Malformed block: {0}")]
    Malformed(#[from] TypesError),

    #[error("Coinbase must not carry an amount")]
    CoinbaseAmount,

    #[error("Block timestamp {block:.2} is not after the last block at {last:.2}")]
    StaleTimestamp { block: Timestamp, last: Timestamp },

    #[error("Future block rejected {0:.2}s")]
    FromTheFuture(f64),

    #[error("Invalid transaction {signature}: {reason}")]
    InvalidTransaction { signature: String, reason: String },

    #[error("Transaction {0} appears twice in the block")]
    Duplicate(String),

    #[error("Transaction {0} is already in the ledger")]
    AlreadyLedgered(String),

    #[error("{address} spends {needed} with a balance of {balance}")]
    InsufficientBalance {
        address: String,
        needed: Amount,
        balance: Amount,
    },

    #[error("{0}")]
    Pow(PowRejection),

    #[error("Ledger error: {0}")]
    Storage(#[from] StorageError),
}

/// A digested block.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestReport {
    pub height: BlockHeight,
    pub hash: String,
    /// Rows written, rewards included
    pub rows: usize,
    /// Pending transactions removed from the mempool
    pub removed_from_mempool: usize,
    pub verdict: PowVerdict,
    pub flush: FlushReport,
}

/// An undone reorg.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Working-tier rows removed
    pub removed_rows: usize,
    /// User transactions handed back to the mempool
    pub returned: usize,
    /// Of those, how many the mempool took
    pub readmitted: usize,
}

/// Where the next block attaches.
struct Tip {
    height: BlockHeight,
    hash: String,
    timestamp: Option<Timestamp>,
}

pub struct BlockDigester {
    ctx: NodeContext,
    fees: FeeSchedule,
}

impl BlockDigester {
    pub fn new(ctx: NodeContext) -> Self {
        Self {
            ctx,
            fees: FeeSchedule::default(),
        }
    }

    /// Digest a block received in wire form.
    pub fn digest_wire(&self, value: &Value) -> Result<DigestReport, DigestError> {
        self.digest(&Block::from_wire(value)?)
    }

    pub fn digest(&self, block: &Block) -> Result<DigestReport, DigestError> {
        let _digestion = self.ctx.digestion.lock();
        match self.digest_locked(block) {
            Ok(report) => {
                info!(
                    "[runtime] Block {} digested: {} rows, difficulty {}, hash {}",
                    report.height,
                    report.rows,
                    report.verdict.achieved(),
                    report.hash
                );
                Ok(report)
            }
            Err(e) => {
                warn!("[runtime] Block rejected: {}", e);
                Err(e)
            }
        }
    }

    fn tip(&self) -> Result<Tip, DigestError> {
        Ok(match self.ctx.ledger.last_block()? {
            Some(last) => Tip {
                height: last.height,
                hash: last.hash,
                timestamp: Some(last.timestamp),
            },
            None => Tip {
                height: 0,
                hash: self.ctx.config.chain.genesis_hash.clone(),
                timestamp: None,
            },
        })
    }

    fn digest_locked(&self, block: &Block) -> Result<DigestReport, DigestError> {
        let coinbase = block.coinbase().ok_or(DigestError::EmptyBlock)?;
        if coinbase.amount != Amount::ZERO {
            return Err(DigestError::CoinbaseAmount);
        }

        let now = self.ctx.clock.now();
        let tip = self.tip()?;
        if let Some(last) = tip.timestamp {
            if coinbase.timestamp <= last {
                return Err(DigestError::StaleTimestamp {
                    block: coinbase.timestamp,
                    last,
                });
            }
        }
        if coinbase.timestamp > now {
            return Err(DigestError::FromTheFuture(coinbase.timestamp - now));
        }

        let mut seen = HashSet::new();
        for tx in &block.transactions {
            check_transaction(tx, coinbase.timestamp)?;
            if !seen.insert(tx.signature.as_str()) {
                return Err(DigestError::Duplicate(tx.signature.clone()));
            }
            if self.ctx.ledger.transaction_by_signature(&tx.signature)?.is_some() {
                return Err(DigestError::AlreadyLedgered(tx.signature.clone()));
            }
        }
        let fees = self.check_balances(block.user_transactions())?;

        let required = self
            .ctx
            .ledger
            .last_difficulty()?
            .map_or(INITIAL_DIFFICULTY, |record| record.difficulty);
        let verdict = self
            .ctx
            .pow
            .verify_block(
                &coinbase.address,
                &coinbase.openfield,
                &tip.hash,
                required,
                now,
                tip.timestamp.unwrap_or(now),
            )
            .map_err(DigestError::Pow)?;

        let height = tip.height + 1;
        let hash = block.hash(&tip.hash);
        let rows = self.rows_for(block, coinbase, height, &hash, fees);

        self.ctx.ledger.append_block(height, required, &rows)?;
        self.ctx.ledger.index().update(&rows)?;

        let signatures: Vec<String> = block
            .user_transactions()
            .iter()
            .map(|tx| tx.signature.clone())
            .collect();
        let removed_from_mempool = match self.ctx.mempool.delete_transactions(&signatures) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("[runtime] Could not clear mined transactions from mempool: {}", e);
                0
            }
        };
        let flush = self.ctx.ledger.flush()?;

        Ok(DigestReport {
            height,
            hash,
            rows: rows.len(),
            removed_from_mempool,
            verdict,
            flush,
        })
    }

    /// Sum of fees, once every sender is known to cover its debits.
    fn check_balances(&self, txs: &[Transaction]) -> Result<Amount, DigestError> {
        let mut batch = BalanceBatch::new();
        let mut debits: HashMap<&str, Amount> = HashMap::new();
        let mut fees = Amount::ZERO;

        for tx in txs {
            let fee = self.fees.fee(&tx.openfield, &tx.operation);
            let spent = debits.entry(tx.address.as_str()).or_insert(Amount::ZERO);
            *spent += tx.amount + fee;
            let balance = self.ctx.ledger.balance_cached(&mut batch, &tx.address)?;
            if *spent > balance {
                return Err(DigestError::InsufficientBalance {
                    address: tx.address.clone(),
                    needed: *spent,
                    balance,
                });
            }
            fees += fee;
        }
        Ok(fees)
    }

    fn rows_for(
        &self,
        block: &Block,
        coinbase: &Transaction,
        height: BlockHeight,
        hash: &str,
        fees: Amount,
    ) -> Vec<LedgerRow> {
        let chain = &self.ctx.config.chain;
        let mut rows: Vec<LedgerRow> = block
            .user_transactions()
            .iter()
            .map(|tx| {
                let fee = self.fees.fee(&tx.openfield, &tx.operation);
                LedgerRow::from_transaction(tx, height, hash, fee, Amount::ZERO)
            })
            .collect();
        rows.push(LedgerRow::from_transaction(
            coinbase,
            height,
            hash,
            Amount::ZERO,
            chain.mining_reward + fees,
        ));
        if !chain.genesis_address.is_empty() {
            rows.push(LedgerRow::reward_row(
                height,
                coinbase.timestamp,
                DEVELOPMENT_REWARD,
                &chain.genesis_address,
                chain.mining_reward,
                hash,
            ));
        }
        rows
    }

    /// Undo every block at or above `height`.
    pub fn rollback(&self, height: BlockHeight) -> Result<RollbackReport, DigestError> {
        let _digestion = self.ctx.digestion.lock();
        let backup = self.ctx.ledger.backup_higher(height)?;
        self.ctx.ledger.rollback_under(height)?;

        let returned: Vec<Transaction> = backup
            .iter()
            .filter(|row| row.block_height > 0 && !row.is_reward())
            .map(LedgerRow::to_transaction)
            .collect();
        let before = self.ctx.mempool.transaction_count().unwrap_or(0);
        self.ctx.mempool.readmit(&returned);
        let after = self.ctx.mempool.transaction_count().unwrap_or(before);

        let report = RollbackReport {
            removed_rows: backup.len(),
            returned: returned.len(),
            readmitted: after.saturating_sub(before),
        };
        warn!(
            "[runtime] Rolled back to below block {}: {} rows removed, {} of {} txs back in mempool",
            height, report.removed_rows, report.readmitted, report.returned
        );
        Ok(report)
    }
}

fn check_transaction(tx: &Transaction, block_time: Timestamp) -> Result<(), DigestError> {
    let invalid = |reason: String| DigestError::InvalidTransaction {
        signature: tx.signature.clone(),
        reason,
    };
    if tx.amount.is_negative() {
        return Err(invalid("negative amount".into()));
    }
    if tx.timestamp > block_time {
        return Err(invalid("timestamp after block".into()));
    }
    verify_encoded(
        &tx.signature,
        &tx.public_key,
        tx.signing_payload().as_bytes(),
        &tx.address,
    )
    .map_err(|e| invalid(e.to_string()))
}
