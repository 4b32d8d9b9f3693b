//! Error types for peer consensus.

use ln_05_wire_codec::WireError;
use thiserror::Error;

/// Failures of peer files, probes and outbound sessions.
///
/// None of these are fatal: a failing peer is left out of the known-good
/// set for the current cycle.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer file {path}: {source}")]
    PeerFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed peer list: {0}")]
    MalformedPeerList(#[from] serde_json::Error),

    #[error("invalid peer address {0}")]
    InvalidAddress(String),

    #[error("{0} did not answer in time")]
    Timeout(String),

    #[error("connect to {peer} failed: {source}")]
    Connect {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is busy")]
    Busy(String),

    #[error("{peer} speaks incompatible protocol version {version}")]
    IncompatibleVersion { peer: String, version: String },

    #[error("{0} refused our handshake")]
    HandshakeRefused(String),

    #[error("unexpected reply from {peer}: {reply}")]
    UnexpectedReply { peer: String, reply: String },

    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, PeerError>;
