//! Scenarios spanning more than one component.

pub mod admission;
pub mod ledger;
pub mod peers;
pub mod pow;
pub mod wire;
