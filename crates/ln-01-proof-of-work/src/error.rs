//! Error types for the proof-of-work gate

use thiserror::Error;

/// Result type alias for proof-of-work operations
pub type Result<T> = std::result::Result<T, PowError>;

/// Fatal errors around the annealing buffer.
///
/// Block rejections are not errors; see `PowRejection`.
#[derive(Debug, Error)]
pub enum PowError {
    /// Requested buffer size cannot hold whole 32-bit words
    #[error("Invalid buffer size {0}: must be a positive multiple of 4")]
    InvalidBufferSize(usize),

    /// Buffer on disk does not match what the generator produces
    #[error("Corrupt annealing buffer {path}: {reason}")]
    CorruptBuffer {
        /// Buffer file
        path: String,
        /// What failed
        reason: String,
    },

    /// Buffer file missing
    #[error("Annealing buffer not found at {0}")]
    BufferMissing(String),

    /// Filesystem failure
    #[error("Buffer I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl PowError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
