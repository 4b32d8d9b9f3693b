//! # HMAC-DRBG
//!
//! Deterministic random bit generator built on HMAC-SHA-512, following the
//! instantiate/update/generate steps of NIST SP 800-90A. Reseeding is not
//! supported: the generator exists to expand a fixed public seed into the
//! proof-of-work buffer, identically on every node.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

const OUTLEN: usize = 64;

/// HMAC-SHA-512 deterministic generator.
pub struct HmacDrbg {
    key: [u8; OUTLEN],
    value: [u8; OUTLEN],
    generate_calls: u64,
}

impl HmacDrbg {
    /// Instantiate from entropy, nonce and personalization string.
    pub fn new(entropy: &[u8], nonce: &[u8], personalization: &[u8]) -> Self {
        let mut drbg = Self {
            key: [0u8; OUTLEN],
            value: [1u8; OUTLEN],
            generate_calls: 0,
        };
        drbg.update(&[entropy, nonce, personalization]);
        drbg
    }

    /// Fill `out` with the next bytes of the stream.
    pub fn generate(&mut self, out: &mut [u8]) {
        for chunk in out.chunks_mut(OUTLEN) {
            self.value = Self::hmac(&self.key, &[&self.value[..]]);
            chunk.copy_from_slice(&self.value[..chunk.len()]);
        }
        self.update(&[]);
        self.generate_calls += 1;
    }

    /// Number of `generate` requests served.
    pub fn generate_calls(&self) -> u64 {
        self.generate_calls
    }

    fn update(&mut self, provided: &[&[u8]]) {
        let has_data = provided.iter().any(|p| !p.is_empty());

        let material = Self::chain(&self.value, 0x00, provided);
        self.key = Self::hmac(&self.key, &[material.as_slice()]);
        self.value = Self::hmac(&self.key, &[&self.value[..]]);

        if has_data {
            let material = Self::chain(&self.value, 0x01, provided);
            self.key = Self::hmac(&self.key, &[material.as_slice()]);
            self.value = Self::hmac(&self.key, &[&self.value[..]]);
        }
    }

    fn chain(value: &[u8], separator: u8, provided: &[&[u8]]) -> Vec<u8> {
        let mut parts = Vec::with_capacity(OUTLEN + 1 + provided.iter().map(|p| p.len()).sum::<usize>());
        parts.extend_from_slice(value);
        parts.push(separator);
        for p in provided {
            parts.extend_from_slice(p);
        }
        parts
    }

    fn hmac(key: &[u8], parts: &[&[u8]]) -> [u8; OUTLEN] {
        let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
        for part in parts {
            mac.update(part);
        }
        let mut out = [0u8; OUTLEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }
}
