//! Adapters: JSON peer files and the TCP connector.

pub mod peer_file;
pub mod tcp_connector;

pub use peer_file::{parse_peer_list, PeerFile, PeerList};
pub use tcp_connector::TcpPeerConnector;
