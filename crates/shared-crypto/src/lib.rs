//! # Shared Crypto - Cryptographic Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-224 | Addresses, proof-of-work candidate hashes |
//! | `signatures` | Ed25519 + base64 | Transaction signing and verification |
//! | `drbg` | HMAC-DRBG (SHA-512) | Deterministic proof-of-work buffer |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - **Address binding**: `verify_encoded` checks the public key hashes to
//!   the claimed sender address before checking the signature
//! - **HMAC-DRBG**: Same seed yields the same stream on every platform

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod drbg;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use drbg::HmacDrbg;
pub use errors::CryptoError;
pub use hashing::{address_from_public_key, sha224, sha224_hex};
pub use signatures::{verify_encoded, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
