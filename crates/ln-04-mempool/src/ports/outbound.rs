//! Outbound (Driven) ports for the mempool.
//!
//! Admission reads the confirmed ledger for balances and for transactions
//! that were already mined.

use shared_types::{Amount, Timestamp};

use crate::domain::MempoolError;

/// Read access to the confirmed ledger.
pub trait LedgerView: Send + Sync {
    /// Confirmed spendable balance of `address`.
    fn balance(&self, address: &str) -> Result<Amount, MempoolError>;

    /// Timestamp of the ledgered transaction with this signature, if mined.
    fn ledgered_at(&self, signature: &str) -> Result<Option<Timestamp>, MempoolError>;
}

/// In-memory ledger for tests.
///
/// Enable with the `test-utils` feature flag.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockLedger {
    balances: parking_lot::RwLock<std::collections::HashMap<String, Amount>>,
    mined: parking_lot::RwLock<std::collections::HashMap<String, Timestamp>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: &str, balance: Amount) -> Self {
        self.set_balance(address, balance);
        self
    }

    pub fn set_balance(&self, address: &str, balance: Amount) {
        self.balances.write().insert(address.to_string(), balance);
    }

    pub fn mine(&self, signature: &str, timestamp: Timestamp) {
        self.mined.write().insert(signature.to_string(), timestamp);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl LedgerView for MockLedger {
    fn balance(&self, address: &str) -> Result<Amount, MempoolError> {
        Ok(self.balances.read().get(address).copied().unwrap_or(Amount::ZERO))
    }

    fn ledgered_at(&self, signature: &str) -> Result<Option<Timestamp>, MempoolError> {
        Ok(self.mined.read().get(signature).copied())
    }
}
