//! Component ports implemented over the ledger store.

pub mod ledger;

pub use ledger::LedgerAdapter;
