//! Configuration types for the proof-of-work gate

use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration for the proof-of-work gate
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PowConfig {
    /// Location of the annealing buffer
    pub buffer_path: PathBuf,

    /// Buffer size in bytes (multiple of 4)
    pub buffer_size: usize,

    /// Seconds without a block before relaxation starts
    pub stall_threshold_secs: f64,

    /// Floor for a relaxed requirement
    pub min_difficulty: f64,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            buffer_path: PathBuf::from("heavy3a.bin"),
            buffer_size: crate::domain::DEFAULT_BUFFER_SIZE,
            stall_threshold_secs: crate::STALL_THRESHOLD_SECS,
            min_difficulty: crate::MIN_DIFFICULTY,
        }
    }
}

impl PowConfig {
    /// Small buffer for tests (1 MiB).
    pub fn for_testing(buffer_path: PathBuf) -> Self {
        Self {
            buffer_path,
            buffer_size: 1 << 20,
            ..Self::default()
        }
    }
}
