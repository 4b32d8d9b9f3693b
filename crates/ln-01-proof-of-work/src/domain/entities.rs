//! Verdicts of the proof-of-work gate.

use std::fmt;

/// A block that passed the gate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PowVerdict {
    /// Achieved difficulty met the full requirement.
    Accepted { achieved: u32, required: f64 },
    /// Accepted only because the chain is stalled.
    Relaxed { achieved: u32, relaxed_to: f64 },
}

impl PowVerdict {
    /// Achieved difficulty.
    pub fn achieved(&self) -> u32 {
        match self {
            Self::Accepted { achieved, .. } | Self::Relaxed { achieved, .. } => *achieved,
        }
    }
}

/// A block that failed the gate.
#[derive(Clone, Debug, PartialEq)]
pub enum PowRejection {
    /// Below the requirement and no stall in progress.
    InsufficientDifficulty { achieved: u32, required: f64 },
    /// Below even the relaxed requirement.
    BelowRelaxed {
        achieved: u32,
        required: f64,
        relaxed_to: f64,
        gap_secs: f64,
    },
    /// Previous hash cannot be compared (empty).
    MalformedPrevHash,
}

impl fmt::Display for PowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientDifficulty { achieved, required } => write!(
                f,
                "Difficulty too low: achieved {} of required {}",
                achieved,
                required.trunc()
            ),
            Self::BelowRelaxed {
                achieved,
                required,
                relaxed_to,
                gap_secs,
            } => write!(
                f,
                "Difficulty too low after {:.0}s stall: achieved {}, required {} relaxed to {}",
                gap_secs,
                achieved,
                required.trunc(),
                relaxed_to.trunc()
            ),
            Self::MalformedPrevHash => write!(f, "Previous block hash is empty"),
        }
    }
}

impl std::error::Error for PowRejection {}
