//! Framing errors.

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised while framing or unframing a message.
#[derive(Debug, Error)]
pub enum WireError {
    /// Header is not ten ASCII digits
    #[error("Invalid frame header {0:?}")]
    InvalidHeader(String),

    /// Header started but did not complete in time; the stream is out of step
    #[error("Timed out after {received} of 10 header bytes")]
    HeaderTimeout { received: usize },

    /// Declared payload exceeds the configured limit
    #[error("Frame payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Payload did not arrive in time after its header
    #[error("Timed out after {received} of {expected} payload bytes")]
    PayloadTimeout { received: usize, expected: usize },

    /// Peer closed the connection
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Payload is not valid JSON
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
