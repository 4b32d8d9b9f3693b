//! # Stateless Admission Checks
//!
//! Everything that can be decided from the candidate alone and the clock,
//! in the order peers expect rejections to be reported:
//!
//! | Step | Rule |
//! |------|------|
//! | 1 | timestamp parses |
//! | 2 | sender and recipient are 56-char hex addresses |
//! | 3 | amount parses |
//! | 4 | field length caps |
//! | 5 | mandatory-message recipients get a message |
//! | 6 | amount is not negative |
//! | 7 | timestamp in `[now - max_age, now]` |
//! | 8 | signature verifies and the key owns the sender address |
//!
//! Ledger and pool lookups happen afterwards, in the service.

use std::collections::HashMap;

use serde_json::Value;
use shared_crypto::verify_encoded;
use shared_types::{is_valid_address, parse_amount, parse_timestamp, Timestamp, Transaction};

use super::errors::Rejection;

pub const MAX_SIGNATURE_LEN: usize = 684;
pub const MAX_PUBLIC_KEY_LEN: usize = 1068;
pub const MAX_OPERATION_LEN: usize = 30;
pub const MAX_OPENFIELD_LEN: usize = 100_000;

/// Openfields this short count as no message at all.
pub const SHORT_MESSAGE_LEN: usize = 4;

/// Inputs of the stateless checks besides the candidate.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub now: Timestamp,
    pub max_age: f64,
    pub mandatory_message: &'a HashMap<String, String>,
}

/// Run steps 1 to 8 on the eight wire fields of one candidate.
pub fn check_candidate(fields: &[Value], ctx: &CheckContext<'_>) -> Result<Transaction, Rejection> {
    let timestamp = parse_timestamp(&fields[0])
        .map_err(|_| Rejection::InvalidTimestamp(text(&fields[0])))?;

    let address = fields[1]
        .as_str()
        .filter(|a| is_valid_address(a))
        .ok_or_else(|| Rejection::InvalidAddress(text(&fields[1])))?;
    let recipient = fields[2]
        .as_str()
        .filter(|r| is_valid_address(r))
        .ok_or_else(|| Rejection::InvalidRecipient(text(&fields[2])))?;

    let amount = parse_amount(&fields[3]).map_err(|_| Rejection::InvalidAmount(text(&fields[3])))?;

    let signature = text(&fields[4]);
    if signature.len() > MAX_SIGNATURE_LEN {
        return Err(Rejection::SignatureLength(signature.len()));
    }
    let public_key = text(&fields[5]);
    if public_key.len() > MAX_PUBLIC_KEY_LEN {
        return Err(Rejection::PublicKeyLength(public_key.len()));
    }
    // text fields are limited in characters, not bytes
    let operation = text(&fields[6]);
    let operation_len = operation.chars().count();
    if operation_len > MAX_OPERATION_LEN {
        return Err(Rejection::OperationLength(operation_len));
    }
    let openfield = text(&fields[7]);
    let openfield_len = openfield.chars().count();
    if openfield_len > MAX_OPENFIELD_LEN {
        return Err(Rejection::OpenfieldLength(openfield_len));
    }

    if openfield_len <= SHORT_MESSAGE_LEN {
        if let Some(hint) = ctx.mandatory_message.get(recipient) {
            return Err(Rejection::MissingMessage(hint.clone()));
        }
    }

    if amount.is_negative() {
        return Err(Rejection::NegativeAmount);
    }
    if timestamp > ctx.now {
        return Err(Rejection::FromTheFuture(timestamp - ctx.now));
    }
    if timestamp < ctx.now - ctx.max_age {
        return Err(Rejection::TooOld);
    }

    let tx = Transaction {
        timestamp,
        address: address.to_string(),
        recipient: recipient.to_string(),
        amount,
        signature,
        public_key,
        operation,
        openfield,
    };

    verify_encoded(
        &tx.signature,
        &tx.public_key,
        tx.signing_payload().as_bytes(),
        &tx.address,
    )
    .map_err(|e| Rejection::BadSignature(e.to_string()))?;

    Ok(tx)
}

/// String fields arrive as strings; anything else is kept in its JSON form
/// so the length caps still apply to it.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
