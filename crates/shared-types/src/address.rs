//! Address format rules.
//!
//! An address is the lowercase hex SHA-224 digest of the owner's public key.

/// Length of a hex-encoded address.
pub const ADDRESS_LEN: usize = 56;

/// Returns true if `address` is 56 lowercase hex characters.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LEN
        && address
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
