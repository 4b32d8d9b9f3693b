//! # Annealing Buffer
//!
//! A read-only array of little-endian 32-bit words expanded from a fixed
//! public seed with HMAC-DRBG. Every node derives the identical buffer.

use shared_crypto::HmacDrbg;

use crate::error::{PowError, Result};

/// Production buffer size: 1 GiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 30;

/// Public seed of the buffer.
pub const BUFFER_SEED: &[u8] = b"ledger-node annealing buffer";

/// Personalization string of the buffer generator.
pub const BUFFER_PERSONALIZATION: &[u8] = b"heavy3a";

/// Bytes produced per generator request.
pub const GENERATION_CHUNK: usize = 4096;

/// Stream the deterministic buffer bytes of `size` into `sink`, one chunk at a time.
pub fn stream_buffer<E>(
    size: usize,
    mut sink: impl FnMut(&[u8]) -> std::result::Result<(), E>,
) -> std::result::Result<(), E> {
    let mut drbg = HmacDrbg::new(BUFFER_SEED, &[], BUFFER_PERSONALIZATION);
    let mut chunk = [0u8; GENERATION_CHUNK];
    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(GENERATION_CHUNK);
        drbg.generate(&mut chunk[..n]);
        sink(&chunk[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Little-endian words of `bytes`; a trailing partial word is ignored.
pub fn le_words(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
}

/// Checks that `size` holds a positive number of whole words.
pub fn validate_buffer_size(size: usize) -> Result<()> {
    if size == 0 || size % 4 != 0 {
        return Err(PowError::InvalidBufferSize(size));
    }
    Ok(())
}

/// The annealing buffer, held in memory.
pub struct RandomBuffer {
    words: Vec<u32>,
}

impl RandomBuffer {
    /// Generate the buffer in memory.
    pub fn generate(size: usize) -> Result<Self> {
        validate_buffer_size(size)?;
        let mut words = Vec::with_capacity(size / 4);
        stream_buffer(size, |chunk| {
            words.extend(le_words(chunk));
            Ok::<(), PowError>(())
        })?;
        Ok(Self { words })
    }

    /// Wrap raw buffer bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        validate_buffer_size(bytes.len())?;
        Ok(Self {
            words: le_words(bytes).collect(),
        })
    }

    /// Wrap words already decoded by the caller.
    pub fn from_words(words: Vec<u32>) -> Result<Self> {
        if words.is_empty() {
            return Err(PowError::InvalidBufferSize(0));
        }
        Ok(Self { words })
    }

    /// Number of 32-bit words (`RND_LEN`).
    pub fn rnd_len(&self) -> usize {
        self.words.len()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.words.len() * 4
    }

    /// Fold one 32-bit word of a candidate against the buffer.
    pub fn fold(&self, word: u32) -> u32 {
        let index = (word & !7) as usize % self.words.len();
        word ^ self.words[index]
    }

    /// Anneal a 224-bit candidate into 56 hex characters.
    ///
    /// The candidate is read as a big-endian integer and split into seven
    /// words; each word is folded on its own and the results are printed
    /// most significant first.
    pub fn anneal(&self, candidate: &[u8; 28]) -> String {
        let mut out = String::with_capacity(56);
        for word in candidate.chunks_exact(4) {
            let word = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
            out.push_str(&format!("{:08x}", self.fold(word)));
        }
        out
    }
}

impl std::fmt::Debug for RandomBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomBuffer")
            .field("rnd_len", &self.words.len())
            .finish()
    }
}
