//! Ports of the mempool.

pub mod outbound;

pub use outbound::LedgerView;
#[cfg(any(test, feature = "test-utils"))]
pub use outbound::MockLedger;
