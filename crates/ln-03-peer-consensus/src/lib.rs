//! # Peer Consensus
//!
//! Peer directory with reputation, connection backoff and chain-height
//! consensus.
//!
//! ## Rules
//!
//! | Rule | Value |
//! |------|-------|
//! | Ban threshold | 30 warning marks (configurable) |
//! | Retry delays | 30 s, 5 min, 15 min, then 30 min |
//! | Same address class | at most 2 active connections (whitelist exempt) |
//! | Consensus | most common reported height, ties to the higher |
//! | Deviation | lead > 30 over a majority consensus of > 10 opinions → 10 warnings |
//! | Stale report | unknown peer > 720 blocks behind is ignored |
//!
//! ## Architecture
//!
//! ```text
//!   connection tasks ──┐                     ┌──→ PeerConnector (TCP)
//!                      ├──→ PeerConsensus ───┤
//!   maintenance loop ──┘                     └──→ peer files (JSON)
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{PeerFile, TcpPeerConnector};
pub use config::PeerConfig;
pub use domain::{OpinionOutcome, PeerError, PeerRecord, PeerStatus, TickReport};
pub use ports::{ChainHeight, PeerConnector};
pub use service::PeerConsensus;
