//! # Proof-of-Work Gate
//!
//! **Component:** ln-01
//!
//! ## Purpose
//!
//! Verifies a candidate block's nonce against a deterministic annealing
//! transform of a large pre-generated pseudo-random buffer, and relaxes
//! the requirement when the chain stalls.
//!
//! ## Algorithm
//!
//! ```text
//! sha224(miner_address ‖ nonce ‖ prev_hash)          224-bit candidate
//!        │
//!        ▼  split into 7 × u32 (big-endian)
//! word ^ buffer[(word & !7) mod RND_LEN]              anneal
//!        │
//!        ▼  hex, highest word first (56 chars)
//! bits(annealed) vs bits(prev_hash)                   8 bits per character
//!        │
//!        ▼
//! shared prefix length = achieved difficulty
//! ```
//!
//! ## Stall Relaxation
//!
//! | Gap since last block | Requirement |
//! |----------------------|-------------|
//! | ≤ 180s | `required` |
//! | 180s – 360s | `required + 1 − gap/180` |
//! | > 360s | `required − 1 − 10·(gap − 360)/180` |
//!
//! The relaxed requirement never drops below the protocol minimum (10).
//!
//! ## Buffer Lifecycle
//!
//! The buffer (1 GiB by default) is produced once by `BufferFile::ensure`
//! under an exclusive file lock and verified against a fingerprint on every
//! `BufferFile::load`. A corrupt or wrong-sized buffer is fatal.
//!
//! ## Module Structure
//!
//! ```text
//! domain/buffer.rs      - RandomBuffer, deterministic generation, anneal
//! domain/difficulty.rs  - bit conversion, prefix difficulty, relaxation
//! domain/entities.rs    - PowVerdict, PowRejection
//! adapters/buffer_file.rs - on-disk buffer with fingerprint and lock
//! service.rs            - ProofOfWorkGate
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;

pub use adapters::BufferFile;
pub use config::PowConfig;
pub use domain::*;
pub use error::{PowError, Result};
pub use service::ProofOfWorkGate;

/// Minimum difficulty a relaxed requirement can fall to.
pub const MIN_DIFFICULTY: f64 = 10.0;

/// Difficulty of the first blocks of a fresh chain.
pub const INITIAL_DIFFICULTY: f64 = 10.0;

/// Seconds without a block before relaxation starts.
pub const STALL_THRESHOLD_SECS: f64 = 180.0;
