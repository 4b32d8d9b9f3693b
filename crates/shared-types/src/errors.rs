//! # Error Types
//!
//! Defines error types for parsing shared entities.

use thiserror::Error;

/// Errors raised while building shared entities from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Input is not a decimal or scientific-notation number.
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: &'static str },

    /// Value does not fit in the 8-decimal fixed-point range.
    #[error("Amount out of range: {0}")]
    AmountOverflow(String),

    /// Timestamp field is not a finite number.
    #[error("Invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// A wire transaction did not have the expected shape.
    #[error("Invalid transaction format: {0}")]
    InvalidFormat(String),
}
