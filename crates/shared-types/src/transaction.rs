//! # Transactions
//!
//! A pending transfer as it travels between nodes and sits in the mempool.
//!
//! ## Wire Form
//!
//! A JSON array of eight fields, in this order:
//!
//! ```text
//! [timestamp, address, recipient, amount, signature, public_key, operation, openfield]
//! ```
//!
//! `timestamp` and `amount` may arrive as strings or numbers; every other
//! field must be a string.
//!
//! ## Signing Payload
//!
//! The signature covers the canonical tuple
//! `('<ts %.2f>', '<address>', '<recipient>', '<amount %.8f>', '<operation>', '<openfield>')`
//! with backslashes and single quotes escaped.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::amount::Amount;
use crate::errors::TypesError;
use crate::time::Timestamp;

/// Number of fields in the wire form.
pub const WIRE_FIELDS: usize = 8;

/// Bytes added to every transaction when estimating storage size.
pub const SIZE_OVERHEAD: usize = 64;

/// A signed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Creation time, quantised to two decimals when signed.
    pub timestamp: Timestamp,
    /// Sender address.
    pub address: String,
    /// Recipient address.
    pub recipient: String,
    /// Transferred amount.
    pub amount: Amount,
    /// Base64 signature over the signing payload.
    pub signature: String,
    /// Base64 public key of the sender.
    pub public_key: String,
    /// Short operation tag (`"0"`, `"token:transfer"`, ...).
    pub operation: String,
    /// Free-form data.
    pub openfield: String,
}

impl Transaction {
    /// Render the tuple a signature covers.
    pub fn canonical_tuple(
        timestamp: Timestamp,
        address: &str,
        recipient: &str,
        amount: Amount,
        operation: &str,
        openfield: &str,
    ) -> String {
        format!(
            "({}, {}, {}, {}, {}, {})",
            quote(&format_timestamp(timestamp)),
            quote(address),
            quote(recipient),
            quote(&amount.to_string()),
            quote(operation),
            quote(openfield)
        )
    }

    /// The bytes this transaction's signature must verify against.
    pub fn signing_payload(&self) -> String {
        Self::canonical_tuple(
            self.timestamp,
            &self.address,
            &self.recipient,
            self.amount,
            &self.operation,
            &self.openfield,
        )
    }

    /// Timestamp as persisted (two decimals).
    pub fn timestamp_string(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// First four characters of the signature, used by the prefix index.
    pub fn signature_prefix(&self) -> &str {
        signature_prefix(&self.signature)
    }

    /// Rough byte footprint, used for mempool capacity triage.
    pub fn estimated_size(&self) -> usize {
        self.timestamp_string().len()
            + self.address.len()
            + self.recipient.len()
            + self.amount.to_string().len()
            + self.signature.len()
            + self.public_key.len()
            + self.operation.len()
            + self.openfield.len()
            + SIZE_OVERHEAD
    }

    /// Encode as the eight-field wire array.
    pub fn to_wire(&self) -> Value {
        json!([
            self.timestamp_string(),
            self.address,
            self.recipient,
            self.amount.to_string(),
            self.signature,
            self.public_key,
            self.operation,
            self.openfield,
        ])
    }

    /// Decode the eight-field wire array.
    ///
    /// Only the shape and numeric fields are checked here; signature and
    /// length rules are enforced by the mempool.
    pub fn from_wire(value: &Value) -> Result<Self, TypesError> {
        let fields = wire_fields(value)?;
        Ok(Self {
            timestamp: parse_timestamp(&fields[0])?,
            address: field_string(&fields[1], "address")?,
            recipient: field_string(&fields[2], "recipient")?,
            amount: parse_amount(&fields[3])?,
            signature: field_string(&fields[4], "signature")?,
            public_key: field_string(&fields[5], "public_key")?,
            operation: field_string(&fields[6], "operation")?,
            openfield: field_string(&fields[7], "openfield")?,
        })
    }
}

/// Two-decimal rendering used in signatures and storage.
pub fn format_timestamp(timestamp: Timestamp) -> String {
    format!("{:.2}", timestamp)
}

/// First four characters of a signature (or the whole thing if shorter).
pub fn signature_prefix(signature: &str) -> &str {
    match signature.char_indices().nth(4) {
        Some((idx, _)) => &signature[..idx],
        None => signature,
    }
}

/// Borrow the eight fields of a wire transaction.
pub fn wire_fields(value: &Value) -> Result<&[Value], TypesError> {
    match value.as_array() {
        Some(fields) if fields.len() == WIRE_FIELDS => Ok(fields.as_slice()),
        Some(fields) => Err(TypesError::InvalidFormat(format!(
            "expected {} fields, got {}",
            WIRE_FIELDS,
            fields.len()
        ))),
        None => Err(TypesError::InvalidFormat("not an array".into())),
    }
}

/// Parse a timestamp given as number or numeric string, quantised to two decimals.
pub fn parse_timestamp(value: &Value) -> Result<Timestamp, TypesError> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(ts) if ts.is_finite() => Ok((ts * 100.0).round() / 100.0),
        _ => Err(TypesError::InvalidTimestamp(value.to_string())),
    }
}

/// Parse an amount given as number or numeric string.
pub fn parse_amount(value: &Value) -> Result<Amount, TypesError> {
    match value {
        Value::String(s) => s.parse(),
        Value::Number(n) => n.to_string().parse(),
        other => Err(TypesError::InvalidAmount {
            input: other.to_string(),
            reason: "not a number",
        }),
    }
}

/// Extract a string field.
pub fn field_string(value: &Value, name: &str) -> Result<String, TypesError> {
    value
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| TypesError::InvalidFormat(format!("{} is not a string", name)))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transaction {
        Transaction {
            timestamp: 1_700_000_000.5,
            address: "a".repeat(56),
            recipient: "b".repeat(56),
            amount: Amount::from_coins(3),
            signature: "c2lnbmF0dXJl".into(),
            public_key: "cHVia2V5".into(),
            operation: "0".into(),
            openfield: "it's".into(),
        }
    }

    #[test]
    fn test_canonical_tuple_layout() {
        let tx = sample();
        let payload = tx.signing_payload();
        assert!(payload.starts_with("('1700000000.50', 'aaaa"));
        assert!(payload.ends_with("'3.00000000', '0', 'it\\'s')"));
    }

    #[test]
    fn test_wire_array_decodes_to_same_transaction() {
        let tx = sample();
        let decoded = Transaction::from_wire(&tx.to_wire()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_from_wire_accepts_numeric_fields() {
        let wire = json!([1700000000.123, "a", "b", 1.5, "s", "p", "0", ""]);
        let tx = Transaction::from_wire(&wire).unwrap();
        assert_eq!(tx.timestamp, 1_700_000_000.12);
        assert_eq!(tx.amount.to_string(), "1.50000000");
    }

    #[test]
    fn test_from_wire_rejects_bad_shapes() {
        assert!(Transaction::from_wire(&json!("nope")).is_err());
        assert!(Transaction::from_wire(&json!(["1", "a"])).is_err());
        let bad_amount = json!(["1", "a", "b", "lots", "s", "p", "0", ""]);
        assert!(matches!(
            Transaction::from_wire(&bad_amount),
            Err(TypesError::InvalidAmount { .. })
        ));
        let bad_field = json!(["1", "a", "b", "1", 7, "p", "0", ""]);
        assert!(matches!(
            Transaction::from_wire(&bad_field),
            Err(TypesError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_signature_prefix() {
        assert_eq!(signature_prefix("abcdef"), "abcd");
        assert_eq!(signature_prefix("ab"), "ab");
    }
}
