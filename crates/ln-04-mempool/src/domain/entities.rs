//! Mempool value objects.

use serde::Serialize;

/// How a batch is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmitOptions {
    /// Skip capacity triage.
    pub size_bypass: bool,
    /// Block until digestion finishes instead of dropping the batch.
    pub wait_for_lock: bool,
}

impl AdmitOptions {
    /// Relayed batch: triaged, dropped while a block is being digested.
    pub const RELAY: AdmitOptions = AdmitOptions {
        size_bypass: false,
        wait_for_lock: false,
    };

    /// Locally submitted transaction: triaged, waits for digestion.
    pub const LOCAL: AdmitOptions = AdmitOptions {
        size_bypass: false,
        wait_for_lock: true,
    };
}

/// Snapshot returned by `Mempool::status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MempoolStatus {
    pub transactions: usize,
    pub openfield_bytes: usize,
    pub senders: usize,
    pub recipients: usize,
    pub size_mb: f64,
    pub frozen_peers: Vec<String>,
}
