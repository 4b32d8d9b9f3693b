//! # Mempool
//!
//! Pending transactions waiting to be mined, with the admission rules a
//! relayed or submitted transaction must pass.
//!
//! ## Admission
//!
//! | Check | Rejection |
//! |-------|-----------|
//! | Peer frozen | `Mempool ignoring merge from frozen {peer}` |
//! | Batch not shaped like transactions | `Bad TX Format` (peer frozen 10 min) |
//! | Digestion running, caller not waiting | `Locked ledger, dropping txs` |
//! | Pool too full for this kind of tx | `Local mempool is already full for this tx type, ...` |
//! | Older than 2 hours / in the future | `Mempool: Too old a transaction` / `... Future transaction rejected` |
//! | Signature | `Mempool: Signature did not match for address (...)` |
//! | Already mined | `That transaction is already in our ledger` (stale relays freeze the peer 5 min) |
//! | Already pending | `That transaction is already in our mempool` |
//! | Balance minus pending debits | `Mempool: Sending more than owned` / `Mempool: Cannot afford to pay fees` |
//!
//! A batch that admitted anything ends with the literal `Success`.
//!
//! ## Architecture
//!
//! ```text
//!   peer handlers ──┐                   ┌──→ LedgerView (balances, mined signatures)
//!                   ├──→ Mempool ───────┤
//!   digester ───────┘                   └──→ PendingStore (SQLite)
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::PendingStore;
pub use config::MempoolConfig;
pub use domain::{AdmitOptions, MempoolError, MempoolStatus, Rejection};
pub use ports::LedgerView;
#[cfg(any(test, feature = "test-utils"))]
pub use ports::MockLedger;
pub use service::{wire_batch, DigestionLock, Mempool, SUCCESS};
