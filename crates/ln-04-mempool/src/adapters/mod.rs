//! SQLite adapter for the pending table.

pub mod sqlite;

pub use sqlite::{PendingStats, PendingStore, MEMPOOL_SCHEMA};
