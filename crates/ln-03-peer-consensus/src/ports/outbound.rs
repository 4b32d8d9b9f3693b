//! # Driven Ports (Outbound SPI)
//!
//! What the service needs from the host: a way to reach peers over the
//! network and our own chain height for the height exchange.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::BlockHeight;

use crate::domain::Result;
use crate::service::PeerConsensus;

/// Network access to other nodes.
///
/// Implementations must release their socket on every return path,
/// including timeouts.
#[async_trait]
pub trait PeerConnector: Send + Sync + 'static {
    /// Check that `host:port` accepts connections. A strict probe also asks
    /// for the peer's protocol version and fails unless it is allowed.
    async fn probe(&self, host: &str, port: u16, strict: bool) -> Result<()>;

    /// Run one outbound session until the connection ends.
    ///
    /// The session registers itself in `peers` (active pool, opinions) and
    /// must undo that before returning.
    async fn run_session(&self, host: &str, port: u16, peers: Arc<PeerConsensus>) -> Result<()>;
}

/// Our own chain tip.
pub trait ChainHeight: Send + Sync {
    fn last_block_height(&self) -> BlockHeight;
}
