//! # Shared Types Crate
//!
//! This crate contains the domain entities exchanged between the node
//! components: pending transactions, persisted ledger rows, fixed-point
//! amounts and the fee schedule.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-component types are defined here.
//! - **Exact Arithmetic**: Amounts are 8-decimal fixed point (`Amount`), never
//!   floating point, so balance sums are reproducible on every node.
//! - **Canonical Signing Payload**: `Transaction::signing_payload()` is the only
//!   place that renders the tuple a signature covers.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `amount` | `Amount` fixed-point value |
//! | `address` | Address format rules |
//! | `fee` | `FeeSchedule` |
//! | `transaction` | `Transaction`, wire form, canonical tuple |
//! | `ledger` | `LedgerRow`, `DifficultyRecord` |
//! | `time` | `TimeSource` and implementations |
//! | `errors` | `TypesError` |

pub mod address;
pub mod amount;
pub mod errors;
pub mod fee;
pub mod ledger;
pub mod time;
pub mod transaction;

pub use address::*;
pub use amount::Amount;
pub use errors::*;
pub use fee::*;
pub use ledger::*;
pub use time::*;
pub use transaction::*;
