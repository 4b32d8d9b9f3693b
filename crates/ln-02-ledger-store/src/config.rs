//! Configuration types for the ledger store

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::RetryPolicy;

/// Runtime configuration for the ledger store
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Directory holding the tier files and the lock file
    pub data_dir: PathBuf,

    /// Full-history tier file name
    pub ledger_file: String,

    /// Recent-window tier file name; older blocks are compressed into
    /// per-address balance rows
    pub hyper_file: String,

    /// Alias/token index file name
    pub index_file: String,

    /// Keep the working tier in memory
    pub ram: bool,

    /// Sleep between retries of a transient storage error (milliseconds)
    pub retry_backoff_ms: u64,

    /// Attempts before a transient error escalates; unbounded when unset
    pub max_retries: Option<u32>,

    /// Write each block in a single SQL transaction instead of one commit per row
    pub atomic_blocks: bool,

    /// Size budget of one block sync reply (bytes)
    pub sync_max_bytes: usize,

    /// Flushed blocks kept verbatim in the hyper tier; 0 disables compression
    pub hyper_window: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("static"),
            ledger_file: "ledger.db".into(),
            hyper_file: "hyper.db".into(),
            index_file: "index.db".into(),
            ram: true,
            retry_backoff_ms: 500,
            max_retries: None,
            atomic_blocks: false,
            sync_max_bytes: 500_000,
            hyper_window: 10_000,
        }
    }
}

impl LedgerConfig {
    /// Store under `data_dir` with fast, bounded retries.
    pub fn for_testing(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            retry_backoff_ms: 5,
            max_retries: Some(20),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_millis(self.retry_backoff_ms),
            max_attempts: self.max_retries,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn hyper_path(&self) -> PathBuf {
        self.data_dir.join(&self.hyper_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_file)
    }
}
