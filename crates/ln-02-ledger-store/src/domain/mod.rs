//! # Domain Layer - Ledger Store
//!
//! Error taxonomy, retry policy, query value objects and per-batch balance
//! memoisation. Nothing here touches SQLite.

pub mod balance;
pub mod entities;
pub mod errors;
pub mod retry;

pub use balance::BalanceBatch;
pub use entities::*;
pub use errors::{ErrorClass, StorageError};
pub use retry::RetryPolicy;
