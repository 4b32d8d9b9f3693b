//! Warning tally and ban list.
//!
//! Warnings are a per-peer counter. A peer is banned on the call that
//! takes its counter from below the threshold to at or above it, and only
//! on that call.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct Reputation {
    threshold: u32,
    warnings: HashMap<String, u32>,
    banned: HashSet<String>,
}

impl Reputation {
    pub fn new(threshold: u32, banlist: &[String]) -> Self {
        Self {
            threshold,
            warnings: HashMap::new(),
            banned: banlist.iter().cloned().collect(),
        }
    }

    /// Add `weight` marks to `ip`. Returns the new count and whether this
    /// call banned the peer.
    pub fn warn(&mut self, ip: &str, weight: u32) -> (u32, bool) {
        let count = self.warnings.entry(ip.to_string()).or_insert(0);
        let before = *count;
        *count = count.saturating_add(weight);
        let after = *count;
        let crossed = before < self.threshold && after >= self.threshold;
        if crossed {
            self.banned.insert(ip.to_string());
        }
        (after, crossed)
    }

    /// Take one mark off `ip`. Returns false if it had none.
    pub fn unban(&mut self, ip: &str) -> bool {
        match self.warnings.get_mut(ip) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.warnings.remove(ip);
                }
                true
            }
            _ => false,
        }
    }

    pub fn warnings(&self, ip: &str) -> u32 {
        self.warnings.get(ip).copied().unwrap_or(0)
    }

    pub fn is_banned(&self, ip: &str) -> bool {
        self.banned.contains(ip)
    }

    pub fn banned_count(&self) -> usize {
        self.banned.len()
    }

    pub fn banned(&self) -> Vec<String> {
        let mut list: Vec<String> = self.banned.iter().cloned().collect();
        list.sort();
        list
    }

    /// Forget every warning and restore the configured ban list.
    pub fn reset(&mut self, banlist: &[String]) {
        self.warnings.clear();
        self.banned = banlist.iter().cloned().collect();
    }
}
