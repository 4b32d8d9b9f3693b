//! Per-batch balance memoisation.

use std::collections::HashMap;

use shared_types::Amount;

/// Memoises ledger balances for one admission or digestion batch.
///
/// Balances can change between batches, so a batch must be cleared (or
/// dropped) before the next one starts.
#[derive(Debug, Default)]
pub struct BalanceBatch {
    cache: HashMap<String, Amount>,
}

impl BalanceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached balance, loading it with `load` on first use.
    pub fn get_or_load<E>(
        &mut self,
        address: &str,
        load: impl FnOnce(&str) -> Result<Amount, E>,
    ) -> Result<Amount, E> {
        if let Some(balance) = self.cache.get(address) {
            return Ok(*balance);
        }
        let balance = load(address)?;
        self.cache.insert(address.to_string(), balance);
        Ok(balance)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
