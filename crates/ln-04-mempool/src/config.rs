//! Configuration types for the mempool

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use shared_types::Amount;

/// Runtime configuration for the mempool
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Keep the pending table in memory instead of `path`
    pub ram: bool,

    /// Pending table file, used when `ram` is off
    pub path: PathBuf,

    /// Oldest accepted transaction (seconds)
    pub max_age_secs: u64,

    /// Freeze for a peer relaying transactions we already ledgered (seconds)
    pub freeze_secs: u64,

    /// Freeze for a peer sending a structurally invalid batch (seconds)
    pub bad_format_freeze_secs: u64,

    /// Ledgered transactions younger than this do not freeze the relaying peer (seconds)
    pub ledger_grace_secs: u64,

    /// Minimum time between two mempool sends to one peer (seconds)
    pub send_interval_secs: u64,

    /// Slack subtracted from a peer's last send time when selecting new transactions (seconds)
    pub send_margin_secs: u64,

    /// Sync entries older than this are dropped on `status()` (seconds)
    pub peer_forget_secs: u64,

    /// Below this size (MB) every transaction is accepted
    pub open_below_mb: f64,

    /// Below this size (MB) data-carrying and token transactions are accepted
    pub data_below_mb: f64,

    /// Below this size (MB) transfers above `value_threshold` are accepted
    pub value_below_mb: f64,

    /// Below this size (MB) only `allowed_senders` are accepted
    pub allowed_below_mb: f64,

    /// Openfield length that makes a transaction data-carrying
    pub data_openfield_len: usize,

    /// Amount above which a transfer keeps priority
    pub value_threshold: Amount,

    /// Senders admitted up to `allowed_below_mb`
    pub allowed_senders: Vec<String>,

    /// Recipients that require an openfield message, with the hint returned on rejection
    pub mandatory_message: HashMap<String, String>,

    /// Peer never frozen (the node itself)
    pub local_peer: String,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            ram: true,
            path: PathBuf::from("mempool.db"),
            max_age_secs: 7200,
            freeze_secs: 5 * 60,
            bad_format_freeze_secs: 10 * 60,
            ledger_grace_secs: 15 * 60,
            send_interval_secs: 30,
            send_margin_secs: 5,
            peer_forget_secs: 15 * 60,
            open_below_mb: 0.3,
            data_below_mb: 0.4,
            value_below_mb: 0.5,
            allowed_below_mb: 0.6,
            data_openfield_len: 200,
            value_threshold: Amount::from_coins(5),
            allowed_senders: Vec::new(),
            mandatory_message: HashMap::new(),
            local_peer: "127.0.0.1".into(),
        }
    }
}

impl MempoolConfig {
    /// In-memory pool with reference-node rules.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// On-disk pool under `dir`.
    pub fn on_disk(dir: &Path) -> Self {
        Self {
            ram: false,
            path: dir.join("mempool.db"),
            ..Self::default()
        }
    }

    /// True when each triage bracket is wider than the previous one.
    pub fn triage_is_increasing(&self) -> bool {
        self.open_below_mb > 0.0
            && self.open_below_mb < self.data_below_mb
            && self.data_below_mb < self.value_below_mb
            && self.value_below_mb < self.allowed_below_mb
    }
}
