//! # Capacity Triage
//!
//! As the pool fills, fewer kinds of transaction get in. Brackets are
//! cumulative: a transaction admitted by a wider bracket is also admitted
//! in every narrower one.
//!
//! | Pool size | Admitted |
//! |-----------|----------|
//! | < 0.3 MB | everything |
//! | < 0.4 MB | openfield > 200 characters, or a `token:` operation |
//! | < 0.5 MB | amount > 5 |
//! | < 0.6 MB | senders on the allow list |
//! | otherwise | nothing |

use std::collections::HashSet;

use serde_json::Value;
use shared_types::{parse_amount, Amount};

use crate::config::MempoolConfig;

/// Operation prefix of token transactions.
pub const TOKEN_OPERATION_PREFIX: &str = "token:";

/// Size brackets and priority rules.
#[derive(Debug, Clone)]
pub struct Triage {
    open_below: f64,
    data_below: f64,
    value_below: f64,
    allowed_below: f64,
    data_openfield_len: usize,
    value_threshold: Amount,
    allowed_senders: HashSet<String>,
}

impl Triage {
    pub fn from_config(config: &MempoolConfig) -> Self {
        Self {
            open_below: config.open_below_mb,
            data_below: config.data_below_mb,
            value_below: config.value_below_mb,
            allowed_below: config.allowed_below_mb,
            data_openfield_len: config.data_openfield_len,
            value_threshold: config.value_threshold,
            allowed_senders: config.allowed_senders.iter().cloned().collect(),
        }
    }

    /// Whether a candidate (eight raw wire fields) fits a pool of `size_mb`.
    ///
    /// Runs before validation, so unparsable fields simply earn no priority.
    pub fn admits(&self, size_mb: f64, fields: &[Value]) -> bool {
        if size_mb < self.open_below {
            return true;
        }
        if size_mb < self.data_below {
            let openfield_len = fields[7].as_str().map_or(0, |o| o.chars().count());
            let token = fields[6]
                .as_str()
                .is_some_and(|op| op.starts_with(TOKEN_OPERATION_PREFIX));
            if openfield_len > self.data_openfield_len || token {
                return true;
            }
        }
        if size_mb < self.value_below
            && parse_amount(&fields[3]).is_ok_and(|amount| amount > self.value_threshold)
        {
            return true;
        }
        size_mb < self.allowed_below
            && fields[1]
                .as_str()
                .is_some_and(|sender| self.allowed_senders.contains(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(sender: &str, amount: &str, operation: &str, openfield: &str) -> Vec<Value> {
        json!(["1.00", sender, "r", amount, "s", "p", operation, openfield])
            .as_array()
            .unwrap()
            .clone()
    }

    fn triage() -> Triage {
        let config = MempoolConfig {
            allowed_senders: vec!["vip".into()],
            ..MempoolConfig::default()
        };
        Triage::from_config(&config)
    }

    #[test]
    fn test_small_pool_admits_everything() {
        assert!(triage().admits(0.29, &candidate("anyone", "0", "0", "")));
    }

    #[test]
    fn test_data_bracket() {
        let t = triage();
        assert!(t.admits(0.35, &candidate("anyone", "1", "0", &"x".repeat(250))));
        assert!(t.admits(0.35, &candidate("anyone", "1", "token:transfer", "")));
        assert!(!t.admits(0.35, &candidate("anyone", "1", "0", "")));
        assert!(!t.admits(0.45, &candidate("anyone", "1", "0", &"x".repeat(250))));
    }

    #[test]
    fn test_value_and_allow_list_brackets() {
        let t = triage();
        assert!(t.admits(0.45, &candidate("anyone", "5.00000001", "0", "")));
        assert!(!t.admits(0.45, &candidate("anyone", "5", "0", "")));
        assert!(t.admits(0.55, &candidate("vip", "0", "0", "")));
        assert!(!t.admits(0.55, &candidate("anyone", "100", "0", "")));
        assert!(!t.admits(0.6, &candidate("vip", "100", "0", "")));
    }
}
