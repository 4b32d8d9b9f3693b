//! # Ledger Adapter
//!
//! Gives the mempool and the peer layer read access to the ledger store:
//!
//! | Port | Crate | Backed by |
//! |------|-------|-----------|
//! | `LedgerView::balance` | ln-04 | `LedgerStore::balance` |
//! | `LedgerView::ledgered_at` | ln-04 | `LedgerStore::transaction_by_signature` |
//! | `ChainHeight::last_block_height` | ln-03 | `LedgerStore::last_block` |

use std::sync::Arc;

use ln_02_ledger_store::LedgerStore;
use ln_03_peer_consensus::ChainHeight;
use ln_04_mempool::{LedgerView, MempoolError};
use shared_types::{Amount, BlockHeight, Timestamp};
use tracing::warn;

#[derive(Clone)]
pub struct LedgerAdapter {
    store: Arc<LedgerStore>,
}

impl LedgerAdapter {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }
}

impl LedgerView for LedgerAdapter {
    fn balance(&self, address: &str) -> Result<Amount, MempoolError> {
        self.store
            .balance(address)
            .map_err(|e| MempoolError::Ledger(e.to_string()))
    }

    fn ledgered_at(&self, signature: &str) -> Result<Option<Timestamp>, MempoolError> {
        self.store
            .transaction_by_signature(signature)
            .map(|row| row.map(|r| r.timestamp))
            .map_err(|e| MempoolError::Ledger(e.to_string()))
    }
}

impl ChainHeight for LedgerAdapter {
    /// Height of the last mined block; 0 for an empty or unreadable ledger.
    fn last_block_height(&self) -> BlockHeight {
        match self.store.last_block() {
            Ok(last) => last.map_or(0, |block| block.height),
            Err(e) => {
                warn!("[runtime] Could not read last block height: {}", e);
                0
            }
        }
    }
}
