//! # Node Runtime Library
//!
//! Wires the ledger-node components into one running node. The binary in
//! `main.rs` only loads configuration and calls [`NodeRuntime::start`].
//!
//! | Module | Role |
//! |--------|------|
//! | `config` | TOML and environment configuration for every component |
//! | `context` | Opens and shares the components of one node |
//! | `adapters` | Ledger-backed implementations of mempool and peer ports |
//! | `block` | Candidate block wire form and hash |
//! | `digester` | Validates and appends blocks, rolls back |
//! | `server` | Answers inbound peer commands |
//! | `maintenance` | Periodic peer, mempool and ledger upkeep |
//! | `runtime` | Starts and stops the long-running tasks |
//!
//! ```text
//!          peers ──TCP──► InboundServer ──► Mempool::admit
//!                              │
//!                              └──────────► BlockDigester ──► LedgerStore
//!                                                 │
//!   Maintenance ──► PeerConsensus / Mempool / LedgerStore::{flush, compress_hyper}
//! ```

#![allow(clippy::too_many_lines)]

pub mod adapters;
pub mod block;
pub mod config;
pub mod context;
pub mod digester;
pub mod maintenance;
pub mod runtime;
pub mod server;

pub use block::Block;
pub use config::{ConfigError, NodeConfig};
pub use context::NodeContext;
pub use digester::{BlockDigester, DigestError, DigestReport, RollbackReport};
pub use maintenance::{Maintenance, MaintenanceReport};
pub use runtime::NodeRuntime;
pub use server::InboundServer;
