//! # Ledger Directory Lock
//!
//! One node process per ledger directory. Two processes appending to the
//! same tier files would interleave half-written blocks.
//!
//! The lock is an `fs2` exclusive lock on `<data_dir>/LOCK`, which also
//! records the owner's PID for the error message of the loser.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::domain::StorageError;

/// Exclusive lock on a ledger directory, released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Take the lock without waiting.
    pub fn acquire(data_dir: &Path) -> Result<Self, StorageError> {
        let path = data_dir.join(Self::LOCK_FILE);
        let io_error = |e: std::io::Error| StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::DataDirLocked {
                path: data_dir.display().to_string(),
                pid: std::fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| s.trim().parse().ok()),
            });
        }

        file.set_len(0).map_err(io_error)?;
        writeln!(file, "{}", std::process::id()).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
