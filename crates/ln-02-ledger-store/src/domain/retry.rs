//! # Retry Policy
//!
//! Transient storage errors are retried with a fixed backoff; permanent
//! ones are logged and returned at once. The default policy never gives up,
//! so a node with a contended or briefly unavailable disk stalls and keeps
//! logging instead of terminating. A bounded policy escalates with
//! [`StorageError::RetriesExhausted`].

use std::time::Duration;

use tracing::{error, warn};

use super::errors::StorageError;

/// Backoff and attempt limit for storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between attempts.
    pub backoff: Duration,
    /// Total attempts before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(500),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn bounded(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts: Some(max_attempts),
        }
    }

    /// Run `op` until it succeeds, fails permanently or runs out of attempts.
    pub fn run<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => {
                    error!("[ln-02] {} abandoned: {}", operation, e);
                    return Err(e);
                }
                Err(e) => {
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        error!("[ln-02] {} gave up after {} attempts: {}", operation, attempts, e);
                        return Err(StorageError::RetriesExhausted {
                            operation,
                            attempts,
                            last: e.to_string(),
                        });
                    }
                    warn!(
                        "[ln-02] {} attempt {} failed, retrying in {:?}: {}",
                        operation, attempts, self.backoff, e
                    );
                    std::thread::sleep(self.backoff);
                }
            }
        }
    }
}
