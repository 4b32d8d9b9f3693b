//! Codec limits and timeouts.

use serde::Deserialize;
use std::time::Duration;

/// Framing configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Wait for a header before reporting an idle connection (seconds)
    pub header_timeout_secs: u64,
    /// Wait for the rest of a frame once its header arrived (seconds)
    pub payload_timeout_secs: u64,
    /// Largest accepted payload in bytes
    pub max_payload_bytes: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            header_timeout_secs: 15,
            payload_timeout_secs: 15,
            max_payload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl WireConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            header_timeout_secs: 1,
            payload_timeout_secs: 1,
            max_payload_bytes: 1024 * 1024,
        }
    }

    pub fn header_timeout(&self) -> Duration {
        Duration::from_secs(self.header_timeout_secs)
    }

    pub fn payload_timeout(&self) -> Duration {
        Duration::from_secs(self.payload_timeout_secs)
    }
}
