//! # SHA-224 Hashing
//!
//! The 224-bit digest used for addresses and proof-of-work candidates.

use sha2::{Digest, Sha224};

/// SHA-224 output (224-bit).
pub type Hash224 = [u8; 28];

/// Hash data with SHA-224 (one-shot).
pub fn sha224(data: &[u8]) -> Hash224 {
    let mut out = [0u8; 28];
    out.copy_from_slice(&Sha224::digest(data));
    out
}

/// Lowercase hex SHA-224 of `data`.
pub fn sha224_hex(data: &[u8]) -> String {
    hex::encode(sha224(data))
}

/// Address owned by a public key: hex SHA-224 of its encoded form.
pub fn address_from_public_key(public_key_b64: &str) -> String {
    sha224_hex(public_key_b64.as_bytes())
}
