//! # Domain Layer - Mempool
//!
//! Admission rules with no storage behind them: stateless candidate
//! checks, capacity triage and the per-peer relay marks.

pub mod entities;
pub mod errors;
pub mod sync_book;
pub mod triage;
pub mod validation;

pub use entities::{AdmitOptions, MempoolStatus};
pub use errors::{MempoolError, Rejection, Result};
pub use sync_book::SyncBook;
pub use triage::{Triage, TOKEN_OPERATION_PREFIX};
pub use validation::{check_candidate, CheckContext};
