//! # Annealing Buffer File
//!
//! The buffer lives next to the node data as `heavy3a.bin` with a
//! `heavy3a.bin.sha224` fingerprint sidecar.
//!
//! Generation happens at most once: the writer holds an exclusive `fs2`
//! lock on `<buffer>.lock`, streams the generator into `<buffer>.tmp` and
//! renames it into place. A second process cold-starting at the same time
//! blocks on the lock and then finds the finished file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha224};
use tracing::{debug, info};

use crate::domain::{le_words, stream_buffer, validate_buffer_size, RandomBuffer};
use crate::error::{PowError, Result};

const READ_CHUNK: usize = 1 << 16;
const PROGRESS_STEP: usize = 1 << 28;

/// On-disk annealing buffer.
#[derive(Clone, Debug)]
pub struct BufferFile {
    path: PathBuf,
    size: usize,
}

impl BufferFile {
    pub fn new(path: impl Into<PathBuf>, size: usize) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Path of the fingerprint sidecar.
    pub fn fingerprint_path(&self) -> PathBuf {
        self.sidecar(".sha224")
    }

    /// Generate the buffer unless a complete one already exists.
    ///
    /// Returns `true` if this call wrote the file.
    pub fn ensure(&self) -> Result<bool> {
        validate_buffer_size(self.size)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PowError::io(parent, e))?;
        }

        let lock_path = self.sidecar(".lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| PowError::io(&lock_path, e))?;
        lock.lock_exclusive().map_err(|e| PowError::io(&lock_path, e))?;

        let result = if self.is_complete() {
            debug!("[ln-01] Annealing buffer present at {}", self.path.display());
            Ok(false)
        } else {
            self.write_buffer().map(|_| true)
        };

        let _ = lock.unlock();
        result
    }

    fn is_complete(&self) -> bool {
        let size_ok = fs::metadata(&self.path)
            .map(|m| m.len() == self.size as u64)
            .unwrap_or(false);
        size_ok && self.fingerprint_path().exists()
    }

    fn write_buffer(&self) -> Result<()> {
        info!(
            "[ln-01] Generating {} byte annealing buffer at {}",
            self.size,
            self.path.display()
        );
        let tmp = self.sidecar(".tmp");
        let file = File::create(&tmp).map_err(|e| PowError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Sha224::new();
        let mut written = 0usize;

        stream_buffer(self.size, |chunk| {
            hasher.update(chunk);
            writer.write_all(chunk)?;
            written += chunk.len();
            if written % PROGRESS_STEP == 0 {
                info!("[ln-01] Annealing buffer {} MiB written", written >> 20);
            }
            Ok::<(), std::io::Error>(())
        })
        .map_err(|e| PowError::io(&tmp, e))?;

        let file = writer
            .into_inner()
            .map_err(|e| PowError::io(&tmp, e.into_error()))?;
        file.sync_all().map_err(|e| PowError::io(&tmp, e))?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| PowError::io(&self.path, e))?;
        let fingerprint = self.fingerprint_path();
        fs::write(&fingerprint, hex::encode(hasher.finalize()))
            .map_err(|e| PowError::io(&fingerprint, e))?;

        info!("[ln-01] Annealing buffer ready");
        Ok(())
    }

    /// Load and verify the buffer.
    ///
    /// A missing file, a wrong size or a fingerprint mismatch is fatal.
    pub fn load(&self) -> Result<RandomBuffer> {
        validate_buffer_size(self.size)?;
        let corrupt = |reason: String| PowError::CorruptBuffer {
            path: self.path.display().to_string(),
            reason,
        };

        let file = File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PowError::BufferMissing(self.path.display().to_string()),
            _ => PowError::io(&self.path, e),
        })?;
        let len = file.metadata().map_err(|e| PowError::io(&self.path, e))?.len();
        if len != self.size as u64 {
            return Err(corrupt(format!("size {} expected {}", len, self.size)));
        }

        let fingerprint_path = self.fingerprint_path();
        let expected = fs::read_to_string(&fingerprint_path)
            .map_err(|_| corrupt("fingerprint missing".into()))?;

        // decode while hashing so the buffer is only held once, as words
        let mut reader = BufReader::new(file);
        let mut hasher = Sha224::new();
        let mut words = Vec::with_capacity(self.size / 4);
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut remaining = self.size;
        while remaining > 0 {
            let n = remaining.min(READ_CHUNK);
            reader
                .read_exact(&mut chunk[..n])
                .map_err(|e| PowError::io(&self.path, e))?;
            hasher.update(&chunk[..n]);
            words.extend(le_words(&chunk[..n]));
            remaining -= n;
        }

        if hex::encode(hasher.finalize()) != expected.trim() {
            return Err(corrupt("fingerprint mismatch".into()));
        }
        debug!("[ln-01] Annealing buffer verified ({} bytes)", self.size);
        RandomBuffer::from_words(words)
    }

    /// `ensure` then `load`.
    pub fn open(&self) -> Result<RandomBuffer> {
        self.ensure()?;
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SIZE: usize = 32 * 1024;

    #[test]
    fn test_ensure_generates_once() {
        let dir = TempDir::new().unwrap();
        let file = BufferFile::new(dir.path().join("heavy3a.bin"), SIZE);

        assert!(file.ensure().unwrap());
        assert!(!file.ensure().unwrap());
        assert!(file.fingerprint_path().exists());
        assert!(!dir.path().join("heavy3a.bin.tmp").exists());
    }

    #[test]
    fn test_loaded_buffer_matches_generator() {
        let dir = TempDir::new().unwrap();
        let file = BufferFile::new(dir.path().join("buf.bin"), SIZE);
        let loaded = file.open().unwrap();
        let generated = RandomBuffer::generate(SIZE).unwrap();

        let candidate = [0x5a; 28];
        assert_eq!(loaded.anneal(&candidate), generated.anneal(&candidate));
        assert_eq!(loaded.rnd_len(), SIZE / 4);
    }

    #[test]
    fn test_load_decodes_a_final_partial_chunk() {
        let dir = TempDir::new().unwrap();
        let size = READ_CHUNK + 12;
        let file = BufferFile::new(dir.path().join("odd.bin"), size);
        let loaded = file.open().unwrap();
        let generated = RandomBuffer::generate(size).unwrap();

        assert_eq!(loaded.rnd_len(), size / 4);
        for seed in 0..32u8 {
            let candidate = [seed; 28];
            assert_eq!(loaded.anneal(&candidate), generated.anneal(&candidate));
        }
    }

    #[test]
    fn test_load_missing_buffer() {
        let dir = TempDir::new().unwrap();
        let file = BufferFile::new(dir.path().join("none.bin"), SIZE);
        assert!(matches!(file.load(), Err(PowError::BufferMissing(_))));
    }

    // =========================================================================
    // CORRUPTION
    // =========================================================================

    #[test]
    fn test_load_rejects_wrong_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buf.bin");
        BufferFile::new(&path, SIZE).ensure().unwrap();

        let other = BufferFile::new(&path, SIZE * 2);
        assert!(matches!(other.load(), Err(PowError::CorruptBuffer { .. })));
    }

    #[test]
    fn test_load_rejects_tampered_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buf.bin");
        let file = BufferFile::new(&path, SIZE);
        file.ensure().unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[100] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        match file.load() {
            Err(PowError::CorruptBuffer { reason, .. }) => assert_eq!(reason, "fingerprint mismatch"),
            other => panic!("expected corrupt buffer, got {:?}", other),
        }
    }
}
