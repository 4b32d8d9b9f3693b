//! Time sources.
//!
//! Timestamps are Unix seconds as `f64`; transactions carry two decimals.

/// Unix time in seconds.
pub type Timestamp = f64;

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current Unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// A time source that only moves when told to.
///
/// Enable with the `test-utils` feature flag.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct ManualTimeSource {
    bits: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualTimeSource {
    /// Create a source frozen at `initial`.
    pub fn new(initial: Timestamp) -> Self {
        Self {
            bits: std::sync::atomic::AtomicU64::new(initial.to_bits()),
        }
    }

    /// Jump to `time`.
    pub fn set(&self, time: Timestamp) {
        self.bits
            .store(time.to_bits(), std::sync::atomic::Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let _ = self.bits.fetch_update(
            std::sync::atomic::Ordering::SeqCst,
            std::sync::atomic::Ordering::SeqCst,
            |bits| Some((f64::from_bits(bits) + secs).to_bits()),
        );
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        f64::from_bits(self.bits.load(std::sync::atomic::Ordering::SeqCst))
    }
}
