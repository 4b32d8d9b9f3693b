//! Ports of the peer consensus service.

pub mod outbound;

pub use outbound::{ChainHeight, PeerConnector};
