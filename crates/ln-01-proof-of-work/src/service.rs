//! # Proof-of-Work Gate Service
//!
//! Holds the loaded annealing buffer and the relaxation parameters. The
//! buffer is shared read-only, so one gate can serve every connection.

use std::sync::Arc;

use shared_crypto::sha224;
use tracing::{debug, warn};

use crate::adapters::BufferFile;
use crate::config::PowConfig;
use crate::domain::{
    bin_convert, relaxed_requirement, shared_prefix_len, PowRejection, PowVerdict, RandomBuffer,
};
use crate::error::Result;

/// Verifies block nonces against the annealing buffer.
#[derive(Clone)]
pub struct ProofOfWorkGate {
    buffer: Arc<RandomBuffer>,
    config: PowConfig,
}

impl ProofOfWorkGate {
    pub fn new(buffer: Arc<RandomBuffer>, config: PowConfig) -> Self {
        Self { buffer, config }
    }

    /// Generate (if needed) and load the buffer described by `config`.
    pub fn open(config: PowConfig) -> Result<Self> {
        let buffer = BufferFile::new(&config.buffer_path, config.buffer_size).open()?;
        Ok(Self::new(Arc::new(buffer), config))
    }

    pub fn config(&self) -> &PowConfig {
        &self.config
    }

    pub fn buffer(&self) -> &RandomBuffer {
        &self.buffer
    }

    /// Anneal a 224-bit candidate hash.
    pub fn anneal(&self, candidate: &[u8; 28]) -> String {
        self.buffer.anneal(candidate)
    }

    /// Difficulty achieved by `nonce` for `address` on top of `prev_hash`.
    pub fn difficulty(&self, address: &str, nonce: &str, prev_hash: &str) -> u32 {
        let mut input = String::with_capacity(address.len() + nonce.len() + prev_hash.len());
        input.push_str(address);
        input.push_str(nonce);
        input.push_str(prev_hash);

        let annealed = self.anneal(&sha224(input.as_bytes()));
        shared_prefix_len(&bin_convert(&annealed), &bin_convert(prev_hash)) as u32
    }

    /// Check a block's nonce, relaxing the requirement during a stall.
    ///
    /// Requirements are compared by their integer part.
    pub fn verify_block(
        &self,
        miner_address: &str,
        nonce: &str,
        prev_hash: &str,
        required: f64,
        received_time: f64,
        last_accepted_time: f64,
    ) -> std::result::Result<PowVerdict, PowRejection> {
        if prev_hash.is_empty() {
            return Err(PowRejection::MalformedPrevHash);
        }
        let achieved = self.difficulty(miner_address, nonce, prev_hash);
        if f64::from(achieved) >= required.trunc() {
            return Ok(PowVerdict::Accepted { achieved, required });
        }

        let gap_secs = received_time - last_accepted_time;
        let rejection = match relaxed_requirement(
            required,
            gap_secs,
            self.config.stall_threshold_secs,
            self.config.min_difficulty,
        ) {
            Some(relaxed_to) if f64::from(achieved) >= relaxed_to.trunc() => {
                debug!(
                    "[ln-01] Accepting relaxed block: achieved {} relaxed to {} after {:.0}s",
                    achieved, relaxed_to, gap_secs
                );
                return Ok(PowVerdict::Relaxed { achieved, relaxed_to });
            }
            Some(relaxed_to) => PowRejection::BelowRelaxed {
                achieved,
                required,
                relaxed_to,
                gap_secs,
            },
            None => PowRejection::InsufficientDifficulty { achieved, required },
        };

        warn!("[ln-01] Block from {} rejected: {}", miner_address, rejection);
        Err(rejection)
    }

    /// Search for a nonce reaching `difficulty`; `None` after `max_attempts`.
    pub fn mine(
        &self,
        address: &str,
        prev_hash: &str,
        difficulty: u32,
        max_attempts: u64,
    ) -> Option<String> {
        (0..max_attempts)
            .map(|attempt| format!("{:016x}", attempt))
            .find(|nonce| self.difficulty(address, nonce, prev_hash) >= difficulty)
    }
}
