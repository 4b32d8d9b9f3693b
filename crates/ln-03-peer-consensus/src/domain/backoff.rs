//! Outbound retry book.
//!
//! | Previous tries | Delay before the next attempt |
//! |----------------|-------------------------------|
//! | 0 | 30 s |
//! | 1 | 5 min |
//! | 2 | 15 min |
//! | 3 (cap) | 30 min |

use std::collections::HashMap;

use shared_types::Timestamp;

/// Tries are counted up to this value.
pub const MAX_TRIES: u32 = 3;

/// `reset_tried` drops entries whose next retry is further away than this.
pub const RESET_HORIZON_SECS: f64 = 12.0 * 60.0;

/// Delay after the `tries`-th failed attempt.
pub fn retry_delay(tries: u32) -> f64 {
    match tries {
        0 => 30.0,
        1 => 5.0 * 60.0,
        2 => 15.0 * 60.0,
        _ => 30.0 * 60.0,
    }
}

/// `host:port` → (tries, next eligible retry time).
#[derive(Debug, Clone, Default)]
pub struct RetryBook {
    entries: HashMap<String, (u32, Timestamp)>,
}

impl RetryBook {
    /// Record an attempt; returns the delay applied.
    pub fn add_try(&mut self, key: &str, now: Timestamp) -> f64 {
        let tries = self.entries.get(key).map(|(t, _)| *t).unwrap_or(0);
        let delay = retry_delay(tries);
        self.entries
            .insert(key.to_string(), ((tries + 1).min(MAX_TRIES), now + delay));
        delay
    }

    pub fn del_try(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Forget long timeouts, keep the recent ones.
    pub fn reset_tried(&mut self, now: Timestamp) -> usize {
        let limit = now + RESET_HORIZON_SECS;
        let before = self.entries.len();
        self.entries.retain(|_, (_, next)| *next <= limit);
        before - self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<(u32, Timestamp)> {
        self.entries.get(key).copied()
    }

    /// True while the entry's timeout has not expired.
    pub fn is_waiting(&self, key: &str, now: Timestamp) -> bool {
        self.entries.get(key).is_some_and(|(_, next)| *next > now)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
