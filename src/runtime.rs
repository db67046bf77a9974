//! Runtime utilities shared by the cache and the preloader
//!
//! Provides the time source used for entry ages and the bounded-concurrency
//! primitive that limits simultaneous tile downloads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Millisecond time source for cache timestamps
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
///
/// Persisted entries outlive the process, so their timestamps must be
/// comparable across sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Unified async utilities
pub mod async_utils {
    use super::*;
    use tokio::sync::{OwnedSemaphorePermit, Semaphore};
    use tokio_util::sync::CancellationToken;

    /// Counting semaphore handing out download slots in FIFO order
    #[derive(Debug, Clone)]
    pub struct DownloadSemaphore {
        inner: Arc<Semaphore>,
        max_permits: usize,
    }

    /// One of the semaphore's permits; released when dropped
    #[derive(Debug)]
    pub struct DownloadSlot {
        _permit: OwnedSemaphorePermit,
    }

    impl DownloadSemaphore {
        pub fn new(permits: usize) -> Self {
            let permits = permits.max(1);
            Self {
                inner: Arc::new(Semaphore::new(permits)),
                max_permits: permits,
            }
        }

        /// Wait for a slot. Returns `None` if `cancel` fires first.
        pub async fn acquire(&self, cancel: &CancellationToken) -> Option<DownloadSlot> {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.inner.clone().acquire_owned() => permit
                    .ok()
                    .map(|permit| DownloadSlot { _permit: permit }),
            }
        }

        pub fn try_acquire(&self) -> Option<DownloadSlot> {
            self.inner
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| DownloadSlot { _permit: permit })
        }

        pub fn available_permits(&self) -> usize {
            self.inner.available_permits()
        }

        pub fn in_use(&self) -> usize {
            self.max_permits - self.available_permits()
        }

        pub fn max_permits(&self) -> usize {
            self.max_permits
        }
    }

    /// Sleep for `duration`, returning early with `false` if `cancel` fires
    pub async fn async_delay(duration: Duration, cancel: &CancellationToken) -> bool {
        if duration.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
