//! # Ledger Store
//!
//! Tiered SQLite storage for the ledger: block append, flush to disk,
//! rollback, balances, queries and the alias/token index.
//!
//! ## Tiers
//!
//! | File | Role |
//! |------|------|
//! | `ledger.db` | Full history, written only by flushes |
//! | `hyper.db` | Recent window, older blocks compressed to balance rows; working tier when RAM is off |
//! | in-memory | Working tier when `ram = true`, loaded from `hyper.db` at start |
//! | `index.db` | Aliases and tokens |
//!
//! ## Guarantees
//!
//! - Transient SQLite failures (busy, locked, I/O) are retried until they
//!   clear; integrity errors are logged and returned at once.
//! - A flush clears its destination range first, so repeating it from the
//!   same watermark leaves the durable tiers unchanged.
//! - After `rollback_under(h)` no tier holds a row at or above `h`, or a
//!   reward row at or below `-h`.
//! - `compress_hyper` leaves every balance unchanged, and rollbacks never
//!   reach below the compressed height.
//! - One process per data directory (`locking` feature).

pub mod adapters;
pub mod config;
pub mod domain;
pub mod service;

pub use adapters::{IndexStore, IndexUpdate};
pub use config::LedgerConfig;
pub use domain::{
    BalanceBatch, ErrorClass, FlushReport, LastBlock, RetryPolicy, StorageError, Tier, TxFilter,
};
pub use service::{LedgerStore, HYPERBLOCK_ADDRESS};
