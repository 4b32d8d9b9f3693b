//! # Ed25519 Signatures
//!
//! Transactions carry a base64 signature and a base64 public key. The
//! sender address is the SHA-224 hex of the encoded public key, so a
//! verifier can bind the key to the address without any lookup.
//!
//! ## Security Properties
//!
//! - No RNG dependency (deterministic nonce from message)
//! - Encoded blobs are decoded strictly (standard alphabet, padded)
//! - Secret seeds are zeroized on drop

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

use crate::hashing::address_from_public_key;
use crate::CryptoError;

/// Ed25519 public key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519PublicKey([u8; 32]);

impl Ed25519PublicKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        // Validate it's a valid point
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Decode from the base64 form carried in transactions.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|raw: Vec<u8>| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: raw.len(),
        })?;
        Self::from_bytes(bytes)
    }

    /// Base64 form carried in transactions.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Address owned by this key.
    pub fn address(&self) -> String {
        address_from_public_key(&self.to_base64())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ed25519Signature([u8; 64]);

impl Ed25519Signature {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Decode from the base64 form carried in transactions.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        let bytes: [u8; 64] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(bytes))
    }

    /// Base64 form carried in transactions.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Ed25519 keypair.
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl Ed25519KeyPair {
    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        Self { signing_key }
    }

    /// Get public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        Ed25519PublicKey(verifying_key.to_bytes())
    }

    /// Address owned by this keypair.
    pub fn address(&self) -> String {
        self.public_key().address()
    }

    /// Sign a message (deterministic - no RNG needed).
    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let sig = self.signing_key.sign(message);
        Ed25519Signature(sig.to_bytes())
    }

    /// Get secret seed (for serialization).
    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

/// Verify an encoded signature over `message` and bind the key to `address`.
///
/// Fails if either blob does not decode, the key does not hash to
/// `address`, or the signature does not verify.
pub fn verify_encoded(
    signature_b64: &str,
    public_key_b64: &str,
    message: &[u8],
    address: &str,
) -> Result<(), CryptoError> {
    if address_from_public_key(public_key_b64) != address {
        return Err(CryptoError::AddressMismatch(address.to_string()));
    }
    let public_key = Ed25519PublicKey::from_base64(public_key_b64)?;
    let signature = Ed25519Signature::from_base64(signature_b64)?;
    public_key.verify(message, &signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Ed25519KeyPair::from_seed([1u8; 32]);
        let message = b"Hello, Ed25519!";

        let signature = keypair.sign(message);
        let result = keypair.public_key().verify(message, &signature);

        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Ed25519KeyPair::from_seed([2u8; 32]);

        let signature = keypair.sign(b"message1");
        let result = keypair.public_key().verify(b"message2", &signature);

        assert!(result.is_err());
    }

    #[test]
    fn test_deterministic_from_seed() {
        let a = Ed25519KeyPair::from_seed([7u8; 32]);
        let b = Ed25519KeyPair::from_seed([7u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    // =========================================================================
    // ENCODED VERIFICATION
    // =========================================================================

    #[test]
    fn test_verify_encoded_accepts_matching_address() {
        let keypair = Ed25519KeyPair::from_seed([1u8; 32]);
        let sig = keypair.sign(b"payload").to_base64();
        let key = keypair.public_key().to_base64();

        assert!(verify_encoded(&sig, &key, b"payload", &keypair.address()).is_ok());
    }

    #[test]
    fn test_verify_encoded_rejects_foreign_address() {
        let keypair = Ed25519KeyPair::from_seed([1u8; 32]);
        let other = Ed25519KeyPair::from_seed([2u8; 32]);
        let sig = keypair.sign(b"payload").to_base64();
        let key = keypair.public_key().to_base64();

        assert!(matches!(
            verify_encoded(&sig, &key, b"payload", &other.address()),
            Err(CryptoError::AddressMismatch(_))
        ));
    }

    #[test]
    fn test_verify_encoded_rejects_garbage_blobs() {
        let keypair = Ed25519KeyPair::from_seed([1u8; 32]);
        let key = keypair.public_key().to_base64();

        assert!(matches!(
            verify_encoded("!!!", &key, b"payload", &keypair.address()),
            Err(CryptoError::InvalidSignatureFormat)
        ));
        assert!(verify_encoded("AAAA", "AAAA", b"payload", &address_from_public_key("AAAA")).is_err());
    }
}
