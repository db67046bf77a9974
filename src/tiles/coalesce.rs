//! Request coalescing for tile fetches
//!
//! When several preload requests want the same tile while a fetch for it is
//! already running, only the first (the leader) goes to the network. The rest
//! (followers) wait for the leader's outcome and then read the tile from the
//! cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::core::geo::TileKey;
use crate::prelude::HashMap;

/// How a leader's fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tile was written to the cache
    Loaded,
    /// The fetch failed or timed out
    Failed,
    /// The leader gave up before finishing; followers should retry
    Cancelled,
}

/// Result of registering interest in a tile
pub enum Registration {
    /// Caller must fetch the tile and report through the guard
    Leader(FetchGuard),
    /// Another fetch is running; await its outcome
    Follower(broadcast::Receiver<FetchOutcome>),
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescerStats {
    pub total_requests: u64,
    pub coalesced_requests: u64,
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Tracks in-flight tile fetches
#[derive(Debug, Default)]
pub struct RequestCoalescer {
    in_flight: Mutex<HashMap<TileKey, broadcast::Sender<FetchOutcome>>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader for `key`, or subscribe to the running fetch.
    pub fn register(self: &Arc<Self>, key: TileKey) -> Registration {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(sender) = in_flight.get(&key) {
            self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
            log::debug!("tile {} already in flight, waiting for it", key);
            return Registration::Follower(sender.subscribe());
        }

        let (sender, _) = broadcast::channel(1);
        in_flight.insert(key, sender.clone());
        self.new_requests.fetch_add(1, Ordering::Relaxed);

        Registration::Leader(FetchGuard {
            coalescer: Arc::clone(self),
            key,
            sender,
            finished: false,
        })
    }

    pub fn is_in_flight(&self, key: &TileKey) -> bool {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.contains_key(key))
            .unwrap_or(false)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .map(|in_flight| in_flight.len())
            .unwrap_or(0)
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }

    fn finish(&self, key: &TileKey, sender: &broadcast::Sender<FetchOutcome>, outcome: FetchOutcome) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(key);
        }
        // Receivers may all be gone.
        let _ = sender.send(outcome);
    }
}

/// Leadership over one in-flight fetch.
///
/// Dropping the guard without calling [`FetchGuard::complete`] reports
/// [`FetchOutcome::Cancelled`] to followers.
pub struct FetchGuard {
    coalescer: Arc<RequestCoalescer>,
    key: TileKey,
    sender: broadcast::Sender<FetchOutcome>,
    finished: bool,
}

impl FetchGuard {
    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn complete(mut self, outcome: FetchOutcome) {
        self.finished = true;
        self.coalescer.finish(&self.key, &self.sender, outcome);
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.coalescer
                .finish(&self.key, &self.sender, FetchOutcome::Cancelled);
        }
    }
}

/// Wait for a leader's outcome; a closed channel counts as cancelled.
pub async fn wait_for_outcome(mut receiver: broadcast::Receiver<FetchOutcome>) -> FetchOutcome {
    receiver.recv().await.unwrap_or(FetchOutcome::Cancelled)
}
