//! Peer value objects and snapshots.

use serde::Serialize;
use shared_types::{BlockHeight, Timestamp};

/// `"host:port"` key used by the active pool and the retry book.
pub fn host_port(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

/// Address class of an IPv4 host: everything up to and including the last dot.
///
/// `"10.0.3.7"` → `"10.0.3."`. Hosts without a dot are their own class.
pub fn address_class(host: &str) -> String {
    match host.rfind('.') {
        Some(idx) => host[..=idx].to_string(),
        None => host.to_string(),
    }
}

/// Everything known about one peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerRecord {
    pub host: String,
    pub port: u16,
    /// Failed outbound attempts, capped at 3
    pub tries: u32,
    /// Unix time before which we do not dial again
    pub next_retry: Option<Timestamp>,
    pub warnings: u32,
    pub banned: bool,
    /// Last chain height the peer reported
    pub opinion: Option<BlockHeight>,
}

/// Result of `record_opinion`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpinionOutcome {
    /// Unknown peer far behind our chain; not counted
    Ignored,
    /// Stored; consensus recomputed
    Recorded {
        consensus: BlockHeight,
        percentage: f64,
    },
    /// Deviation warnings pushed the peer over the ban threshold
    Banned,
}

/// What one maintenance tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Outbound sessions started
    pub dispatched: usize,
    /// Known peers after merging the peer files
    pub known: usize,
    /// Peers that passed a probe and were written to a peer file
    pub saved: usize,
    /// Whether the ban list was reset to config
    pub banlist_reset: bool,
}

/// Snapshot for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStatus {
    pub version: String,
    pub known: usize,
    pub active: Vec<String>,
    pub banned: Vec<String>,
    pub tried: usize,
    pub consensus: Option<BlockHeight>,
    pub consensus_percentage: f64,
    pub opinions: usize,
}
