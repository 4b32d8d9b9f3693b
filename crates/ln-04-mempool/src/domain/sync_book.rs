//! Per-peer relay marks.
//!
//! One timestamp per peer serves two purposes. In the past it is the last
//! time our mempool was sent to that peer; in the future it is the end of
//! a freeze, during which the peer's mempool is refused and nothing new
//! is sent to it.

use std::collections::HashMap;

use shared_types::Timestamp;

#[derive(Debug, Default)]
pub struct SyncBook {
    marks: HashMap<String, Timestamp>,
}

impl SyncBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, peer: &str) -> Option<Timestamp> {
        self.marks.get(peer).copied()
    }

    pub fn is_frozen(&self, peer: &str, now: Timestamp) -> bool {
        self.mark(peer).is_some_and(|until| until > now)
    }

    pub fn freeze(&mut self, peer: &str, until: Timestamp) {
        self.marks.insert(peer.to_string(), until);
    }

    /// Record a send at `now`, unless the peer is frozen.
    pub fn sent(&mut self, peer: &str, now: Timestamp) {
        if self.is_frozen(peer, now) {
            return;
        }
        self.marks.insert(peer.to_string(), now);
    }

    /// Never sent to, or last sent more than `interval` seconds ago.
    pub fn sendable(&self, peer: &str, now: Timestamp, interval: f64) -> bool {
        self.mark(peer).map_or(true, |last| last < now - interval)
    }

    /// Frozen peers, sorted.
    pub fn frozen(&self, now: Timestamp) -> Vec<String> {
        let mut peers: Vec<String> = self
            .marks
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Drop marks at or before `limit`; returns how many went.
    pub fn forget_before(&mut self, limit: Timestamp) -> usize {
        let before = self.marks.len();
        self.marks.retain(|_, mark| *mark > limit);
        before - self.marks.len()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
