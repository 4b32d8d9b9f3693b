//! # Fee Schedule
//!
//! Fees are implicit: they are not carried by a transaction but derived
//! from its openfield and operation.
//!
//! | Component | Value |
//! |-----------|-------|
//! | Base fee | 0.01 |
//! | Openfield | `len(openfield) / 100000` |
//! | `token:issue` operation | +10 |
//! | `alias=` openfield | +1 |

use crate::amount::Amount;

/// Operation string that issues a new token.
pub const TOKEN_ISSUE_OPERATION: &str = "token:issue";

/// Openfield prefix that registers an alias.
pub const ALIAS_PREFIX: &str = "alias=";

/// Fee parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    /// Flat fee charged for every transaction.
    pub base: Amount,
    /// Openfield bytes that cost one whole coin.
    pub openfield_divisor: u64,
    /// Surcharge for issuing a token.
    pub token_issue_surcharge: Amount,
    /// Surcharge for registering an alias.
    pub alias_surcharge: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base: Amount::from_units(1_000_000),
            openfield_divisor: 100_000,
            token_issue_surcharge: Amount::from_coins(10),
            alias_surcharge: Amount::from_coins(1),
        }
    }
}

impl FeeSchedule {
    /// Fee owed by a transaction with this openfield and operation.
    pub fn fee(&self, openfield: &str, operation: &str) -> Amount {
        let mut fee = self.base + Amount::from_ratio(openfield.chars().count() as u64, self.openfield_divisor);
        if operation == TOKEN_ISSUE_OPERATION {
            fee += self.token_issue_surcharge;
        }
        if openfield.starts_with(ALIAS_PREFIX) {
            fee += self.alias_surcharge;
        }
        fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_fee_for_empty_openfield() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee("", "").to_string(), "0.01000000");
    }

    #[test]
    fn test_openfield_and_surcharges() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee(&"x".repeat(250), "").to_string(), "0.01250000");
        assert_eq!(fees.fee("gold:1000", TOKEN_ISSUE_OPERATION).to_string(), "10.01009000");
        assert_eq!(fees.fee("alias=bob", "").to_string(), "1.01009000");
    }

    #[test]
    fn test_openfield_is_charged_per_character() {
        let fees = FeeSchedule::default();
        let accented = "é".repeat(100);
        assert_eq!(accented.len(), 200);
        assert_eq!(fees.fee(&accented, ""), fees.fee(&"e".repeat(100), ""));
        assert_eq!(fees.fee(&accented, "").to_string(), "0.01100000");
    }
}
