//! Query value objects.

use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, Timestamp};

/// Storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Full append-only history.
    Ledger,
    /// Recent-window tier.
    Hyper,
    /// Tier that receives new blocks (RAM when enabled, hyper otherwise).
    Working,
}

/// Last block as seen by its reward row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastBlock {
    pub height: BlockHeight,
    pub hash: String,
    pub timestamp: Timestamp,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Transaction rows copied to durable storage.
    pub rows: usize,
    /// Difficulty rows copied.
    pub misc: usize,
    /// New flushed-height watermark.
    pub watermark: BlockHeight,
}

/// Filters of a transaction search. At least one text filter must be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxFilter {
    pub address: Option<String>,
    pub recipient: Option<String>,
    pub operation: Option<String>,
    pub openfield: Option<String>,
    pub min_height: Option<BlockHeight>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TxFilter {
    fn default() -> Self {
        Self {
            address: None,
            recipient: None,
            operation: None,
            openfield: None,
            min_height: None,
            limit: 10,
            offset: 0,
        }
    }
}

impl TxFilter {
    pub fn by_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn by_recipient(recipient: impl Into<String>) -> Self {
        Self {
            recipient: Some(recipient.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.recipient.is_none()
            && self.operation.is_none()
            && self.openfield.is_none()
    }
}
