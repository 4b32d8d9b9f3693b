//! # Domain Errors
//!
//! Every storage failure is either transient (worth retrying: contention,
//! I/O hiccups, a full disk) or permanent (constraint violations, malformed
//! SQL, corrupt values). Permanent errors are logged and abandoned.

use std::fmt;

/// Retry classification of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Lock contention or I/O; retried with backoff.
    Transient,
    /// Integrity or query error; never retried.
    Permanent,
}

/// Errors that can occur during ledger storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// SQLite reported an error.
    Database { class: ErrorClass, message: String },

    /// A bounded retry policy gave up on a transient error.
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last: String,
    },

    /// A stored value could not be decoded.
    CorruptRow { column: &'static str, value: String },

    /// Data directory already opened by another process.
    DataDirLocked { path: String, pid: Option<u32> },

    /// Filesystem failure outside SQLite.
    Io { path: String, message: String },

    /// Rollbacks need a positive height; zero or below would match every row.
    InvalidHeight { operation: &'static str, height: i64 },

    /// Blocks at or below `compressed` only survive as balance rows in the
    /// hyper tier and cannot be rolled back.
    BelowCompression {
        operation: &'static str,
        height: i64,
        compressed: i64,
    },
}

impl StorageError {
    /// Retry classification of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::Database { class, .. } => *class,
            StorageError::Io { .. } => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Database { class, message } => {
                write!(f, "Database error ({:?}): {}", class, message)
            }
            StorageError::RetriesExhausted {
                operation,
                attempts,
                last,
            } => write!(
                f,
                "{} failed after {} attempts, last error: {}",
                operation, attempts, last
            ),
            StorageError::CorruptRow { column, value } => {
                write!(f, "Corrupt value in column {}: {:?}", column, value)
            }
            StorageError::DataDirLocked { path, pid } => match pid {
                Some(p) => write!(f, "Ledger directory {} already in use by process {}", path, p),
                None => write!(f, "Ledger directory {} already in use", path),
            },
            StorageError::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            StorageError::InvalidHeight { operation, height } => {
                write!(f, "{} needs a positive block height, got {}", operation, height)
            }
            StorageError::BelowCompression {
                operation,
                height,
                compressed,
            } => write!(
                f,
                "{} cannot reach block {}, the hyper tier is compressed up to {}",
                operation, height, compressed
            ),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database {
            class: classify(&e),
            message: e.to_string(),
        }
    }
}

/// Sort a SQLite error into transient or permanent.
pub fn classify(e: &rusqlite::Error) -> ErrorClass {
    use rusqlite::ErrorCode;

    match e {
        rusqlite::Error::SqliteFailure(err, _) => match err.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::CannotOpen => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        },
        _ => ErrorClass::Permanent,
    }
}
