//! Mempool error types.
//!
//! Peer data never produces an error: bad transactions become
//! [`Rejection`]s. `MempoolError` covers the pool's own storage and the
//! ledger lookups it depends on.

use std::fmt;

use shared_types::Timestamp;

/// Mempool error type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MempoolError {
    /// Pending table failure.
    Database(String),

    /// Ledger lookup failed.
    Ledger(String),

    /// A stored value could not be decoded.
    CorruptRow { column: &'static str, value: String },
}

impl fmt::Display for MempoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(msg) => write!(f, "Mempool database error: {}", msg),
            Self::Ledger(msg) => write!(f, "Ledger lookup failed: {}", msg),
            Self::CorruptRow { column, value } => {
                write!(f, "Corrupt mempool value in column {}: {:?}", column, value)
            }
        }
    }
}

impl std::error::Error for MempoolError {}

impl From<rusqlite::Error> for MempoolError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MempoolError>;

/// Why a single candidate was not admitted.
///
/// The `Display` form is the outcome string returned to the peer.
#[derive(Clone, Debug, PartialEq)]
pub enum Rejection {
    InvalidTimestamp(String),
    InvalidAddress(String),
    InvalidRecipient(String),
    InvalidAmount(String),
    SignatureLength(usize),
    PublicKeyLength(usize),
    OperationLength(usize),
    OpenfieldLength(usize),
    MissingMessage(String),
    NegativeAmount,
    FromTheFuture(Timestamp),
    TooOld,
    BadSignature(String),
    DeletedFromMempool,
    AlreadyInLedger,
    AlreadyInMempool,
    SendingMoreThanOwned,
    CannotAffordFees,
    NoSpaceLeft,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestamp(raw) => write!(f, "Mempool: Invalid timestamp {}", raw),
            Self::InvalidAddress(raw) => write!(f, "Mempool: Invalid address {}", raw),
            Self::InvalidRecipient(raw) => write!(f, "Mempool: Invalid recipient {}", raw),
            Self::InvalidAmount(raw) => write!(f, "Mempool: Invalid amount {}", raw),
            Self::SignatureLength(n) => write!(f, "Mempool: Invalid signature len{}", n),
            Self::PublicKeyLength(n) => write!(f, "Mempool: Invalid pubkey len{}", n),
            Self::OperationLength(n) => write!(f, "Mempool: Invalid operation len{}", n),
            Self::OpenfieldLength(n) => write!(f, "Mempool: Invalid openfield len{}", n),
            Self::MissingMessage(hint) => write!(f, "Mempool: Missing message - {}", hint),
            Self::NegativeAmount => f.write_str("Mempool: Negative balance spend attempt"),
            Self::FromTheFuture(ahead) => {
                write!(f, "Mempool: Future transaction rejected {:.2}s", ahead)
            }
            Self::TooOld => f.write_str("Mempool: Too old a transaction"),
            Self::BadSignature(e) => {
                write!(f, "Mempool: Signature did not match for address ({})", e)
            }
            Self::DeletedFromMempool => f.write_str("Mempool: Transaction deleted from our mempool"),
            Self::AlreadyInLedger => f.write_str("That transaction is already in our ledger"),
            Self::AlreadyInMempool => f.write_str("That transaction is already in our mempool"),
            Self::SendingMoreThanOwned => f.write_str("Mempool: Sending more than owned"),
            Self::CannotAffordFees => f.write_str("Mempool: Cannot afford to pay fees"),
            Self::NoSpaceLeft => {
                f.write_str("Local mempool is already full for this tx type, skipping merging")
            }
        }
    }
}
