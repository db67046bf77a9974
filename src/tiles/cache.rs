//! Bounded tile cache with scored eviction and optional persistence
//!
//! Entries are evicted when the cache grows past its byte or entry ceiling:
//! expired entries go first, then the lowest-scoring 30% by
//! `access_count × priority / idle_ms`, stopping early once usage falls to 80%
//! of the byte ceiling. Reads expire entries lazily.
//!
//! When built with a [`TileStore`], every write is mirrored to the store by a
//! background task and the store's previous contents are loaded into memory.
//! The cache is usable immediately; reads during the load simply miss. Store
//! failures are logged and switch persistence off for the session.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use super::coalesce::RequestCoalescer;
use super::store::{parse_store_key, store_key, StoreOp, StoredEntry, TileStore};
use crate::core::config::CacheConfig;
use crate::core::constants::{
    EVICTION_BATCH_FRACTION, EVICTION_LOW_WATERMARK, MIN_IDLE_MS, STORE_NAMESPACE,
};
use crate::core::geo::TileKey;
use crate::prelude::{HashMap, HashSet};
use crate::runtime::{Clock, SystemClock};
use crate::Result;

/// A cached tile payload and its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<Vec<u8>>,
    pub size_bytes: usize,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub priority: f64,
    sequence: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: u64, max_age_ms: u64) -> bool {
        now.saturating_sub(self.created_at) > max_age_ms
    }

    /// Higher is more valuable
    fn score(&self, now: u64) -> f64 {
        let idle = (now.saturating_sub(self.last_accessed_at) as f64).max(MIN_IDLE_MS);
        self.access_count as f64 * self.priority / idle
    }

    fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            payload: self.payload.as_ref().clone(),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            priority: self.priority,
        }
    }
}

/// Snapshot of cache usage
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entry_count: usize,
    pub current_size_bytes: usize,
    pub max_size_bytes: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hits over lookups since the last reset; 0 before any lookup
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct LoadTracking {
    loading: bool,
    /// Keys written or deleted while the store load was running
    touched: HashSet<TileKey>,
    cleared: bool,
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<TileKey, CacheEntry>,
    total_size: usize,
    config: CacheConfig,
    hits: u64,
    misses: u64,
    next_sequence: u64,
    load: LoadTracking,
}

impl CacheState {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::default(),
            total_size: 0,
            config,
            hits: 0,
            misses: 0,
            next_sequence: 0,
            load: LoadTracking::default(),
        }
    }

    fn max_age_ms(&self) -> u64 {
        self.config.max_age.as_millis() as u64
    }

    fn sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn touch_during_load(&mut self, key: TileKey) {
        if self.load.loading {
            self.load.touched.insert(key);
        }
    }

    fn insert_entry(&mut self, key: TileKey, entry: CacheEntry) {
        self.total_size += entry.size_bytes;
        if let Some(old) = self.entries.insert(key, entry) {
            self.total_size -= old.size_bytes;
        }
    }

    fn remove_entry(&mut self, key: &TileKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_size -= entry.size_bytes;
        Some(entry)
    }

    fn over_limits(&self) -> bool {
        self.total_size > self.config.max_size_bytes
            || self.entries.len() > self.config.max_entries
    }

    fn at_low_watermark(&self) -> bool {
        self.total_size as f64 <= self.config.max_size_bytes as f64 * EVICTION_LOW_WATERMARK
            && self.entries.len() <= self.config.max_entries
    }

    /// Remove every entry older than the age ceiling
    fn sweep_expired(&mut self, now: u64, removed: &mut Vec<TileKey>) {
        let max_age = self.max_age_ms();
        let expired: Vec<TileKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, max_age))
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            self.remove_entry(&key);
            removed.push(key);
        }
    }

    /// Bring the cache back under its limits. Returns the evicted keys.
    fn evict(&mut self, now: u64, force_sweep: bool) -> Vec<TileKey> {
        let mut removed = Vec::new();
        if !force_sweep && !self.over_limits() {
            return removed;
        }

        self.sweep_expired(now, &mut removed);

        while self.over_limits() && !self.entries.is_empty() {
            let mut ranked: Vec<(TileKey, f64, u64, u64)> = self
                .entries
                .iter()
                .map(|(key, entry)| {
                    (*key, entry.score(now), entry.last_accessed_at, entry.sequence)
                })
                .collect();
            ranked.sort_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then(a.2.cmp(&b.2))
                    .then(a.3.cmp(&b.3))
            });

            let batch = ((ranked.len() as f64 * EVICTION_BATCH_FRACTION).ceil() as usize).max(1);
            for (key, ..) in ranked.into_iter().take(batch) {
                self.remove_entry(&key);
                removed.push(key);
                if self.at_low_watermark() {
                    break;
                }
            }
        }

        if !removed.is_empty() {
            log::debug!(
                "evicted {} tiles, {} bytes in {} entries remain",
                removed.len(),
                self.total_size,
                self.entries.len()
            );
        }
        removed
    }
}

/// Sending side of the persistence task
#[derive(Debug)]
struct Persistence {
    tx: mpsc::UnboundedSender<StoreOp>,
    enabled: Arc<AtomicBool>,
}

/// Bounded tile store shared by the renderer and the preloaders
#[derive(Clone)]
pub struct TileCache {
    state: Arc<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    persistence: Option<Arc<Persistence>>,
    loaded: watch::Receiver<bool>,
    coalescer: Arc<RequestCoalescer>,
}

impl TileCache {
    /// Create a memory-only tile cache
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Memory-only cache with an explicit time source
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let (_, loaded) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(CacheState::new(config))),
            clock,
            persistence: None,
            loaded,
            coalescer: Arc::new(RequestCoalescer::new()),
        }
    }

    /// Create a cache mirrored to `store`.
    ///
    /// Falls back to memory-only (with a warning) when the config disables
    /// persistence, when no store is given, or when called outside a Tokio
    /// runtime. Never fails.
    pub fn with_store(config: CacheConfig, store: Option<Arc<dyn TileStore>>) -> Self {
        Self::with_store_and_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_store_and_clock(
        config: CacheConfig,
        store: Option<Arc<dyn TileStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let persistent = config.persistent;
        let mut cache = Self::with_clock(config, clock);
        if !persistent {
            return cache;
        }

        let Some(store) = store else {
            log::warn!("no persistent tile store available, caching in memory only");
            return cache;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("no async runtime to drive the tile store, caching in memory only");
            return cache;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (loaded_tx, loaded_rx) = watch::channel(false);
        let enabled = Arc::new(AtomicBool::new(true));

        cache.lock().load.loading = true;
        cache.loaded = loaded_rx;
        cache.persistence = Some(Arc::new(Persistence {
            tx,
            enabled: enabled.clone(),
        }));

        let worker = PersistenceWorker {
            store,
            state: cache.state.clone(),
            clock: cache.clock.clone(),
            enabled,
        };
        handle.spawn(worker.run(rx, loaded_tx));
        cache
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Check if a tile is cached without touching its recency
    pub fn has(&self, key: &TileKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Get a tile from the cache.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&self, key: &TileKey) -> Option<Arc<Vec<u8>>> {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let max_age = state.max_age_ms();

        let lookup = state.entries.get_mut(key).map(|entry| {
            if entry.is_expired(now, max_age) {
                None
            } else {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                Some(entry.payload.clone())
            }
        });

        match lookup {
            Some(Some(payload)) => {
                state.hits += 1;
                Some(payload)
            }
            Some(None) => {
                state.remove_entry(key);
                state.misses += 1;
                self.mirror(StoreOp::Remove(vec![store_key(key)]));
                log::debug!("tile {} expired", key);
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert a tile into the cache with the default priority
    pub fn set(&self, key: TileKey, payload: Vec<u8>) {
        self.set_with_priority(key, payload, 1.0);
    }

    /// Insert or overwrite a tile.
    ///
    /// `priority` scales the eviction score; it never pins an entry. Payloads
    /// larger than the byte ceiling are not cached, and any previous entry for
    /// the key is dropped.
    ///
    /// Store writes are queued under the state lock, in memory order.
    pub fn set_with_priority(&self, key: TileKey, payload: Vec<u8>, priority: f64) {
        let priority = if priority.is_finite() && priority >= 0.0 {
            priority
        } else {
            1.0
        };
        let now = self.clock.now_ms();
        let size_bytes = payload.len();

        let mut state = self.lock();
        state.touch_during_load(key);
        if size_bytes > state.config.max_size_bytes {
            log::warn!(
                "tile {} ({} bytes) exceeds the cache ceiling of {} bytes, not cached",
                key,
                size_bytes,
                state.config.max_size_bytes
            );
            state.remove_entry(&key);
            self.mirror(StoreOp::Remove(vec![store_key(&key)]));
            return;
        }

        let entry = CacheEntry {
            payload: Arc::new(payload),
            size_bytes,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            priority,
            sequence: state.sequence(),
        };
        let stored = self.persistence.as_ref().map(|_| entry.to_stored());
        state.insert_entry(key, entry);
        let evicted = state.evict(now, false);

        if let Some(stored) = stored.filter(|_| !evicted.contains(&key)) {
            match stored.to_json() {
                Ok(value) => self.mirror(StoreOp::Put {
                    key: store_key(&key),
                    value,
                }),
                Err(e) => log::warn!("could not serialize tile {}: {}", key, e),
            }
        }
        self.mirror_evictions(evicted);
    }

    /// Remove a tile; a missing key is not an error
    pub fn delete(&self, key: &TileKey) {
        let mut state = self.lock();
        state.touch_during_load(*key);
        state.remove_entry(key);
        self.mirror(StoreOp::Remove(vec![store_key(key)]));
    }

    /// Remove all tiles, including the persistent namespace
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.total_size = 0;
        if state.load.loading {
            state.load.cleared = true;
        }
        self.mirror(StoreOp::Clear);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            entry_count: state.entries.len(),
            current_size_bytes: state.total_size,
            max_size_bytes: state.config.max_size_bytes,
            max_entries: state.config.max_entries,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }

    /// Zero the hit/miss counters
    pub fn reset_stats(&self) {
        let mut state = self.lock();
        state.hits = 0;
        state.misses = 0;
    }

    /// Change the byte ceiling and evict immediately
    pub fn set_max_size(&self, bytes: usize) {
        self.reconfigure(|config| config.max_size_bytes = bytes);
    }

    /// Change the age ceiling and sweep immediately
    pub fn set_max_age(&self, max_age: Duration) {
        self.reconfigure(|config| config.max_age = max_age);
    }

    /// Change the entry ceiling and evict immediately
    pub fn set_max_entries(&self, entries: usize) {
        self.reconfigure(|config| config.max_entries = entries);
    }

    fn reconfigure(&self, update: impl FnOnce(&mut CacheConfig)) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        update(&mut state.config);
        let evicted = state.evict(now, true);
        self.mirror_evictions(evicted);
    }

    pub fn config(&self) -> CacheConfig {
        self.lock().config.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all live entries, in no particular order
    pub fn keys(&self) -> Vec<TileKey> {
        self.lock().entries.keys().copied().collect()
    }

    /// Coalescer shared by every preloader targeting this cache
    pub fn coalescer(&self) -> Arc<RequestCoalescer> {
        self.coalescer.clone()
    }

    /// Whether writes are still being mirrored to a store
    pub fn is_persistent(&self) -> bool {
        self.persistence
            .as_ref()
            .map(|p| p.enabled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Whether the initial store load has finished (always true in memory-only mode)
    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    pub async fn wait_until_loaded(&self) {
        let mut loaded = self.loaded.clone();
        while !*loaded.borrow_and_update() {
            if loaded.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait until every store write queued so far has been attempted
    pub async fn flush(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if persistence.tx.send(StoreOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    fn mirror(&self, op: StoreOp) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        if !persistence.enabled.load(Ordering::SeqCst) {
            return;
        }
        if persistence.tx.send(op).is_err() {
            log::debug!("tile store task has stopped, dropping write");
        }
    }

    fn mirror_evictions(&self, evicted: Vec<TileKey>) {
        if !evicted.is_empty() {
            self.mirror(StoreOp::Remove(evicted.iter().map(store_key).collect()));
        }
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(CacheConfig::memory_only())
    }
}

impl fmt::Debug for TileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("stats", &self.stats())
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

/// Background task that loads the store and then applies queued writes in order
struct PersistenceWorker {
    store: Arc<dyn TileStore>,
    state: Arc<Mutex<CacheState>>,
    clock: Arc<dyn Clock>,
    enabled: Arc<AtomicBool>,
}

impl PersistenceWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<StoreOp>, loaded: watch::Sender<bool>) {
        self.load().await;
        let _ = loaded.send(true);

        while let Some(op) = rx.recv().await {
            if let Err(e) = self.apply(op).await {
                self.disable(&e);
            }
        }
        log::debug!("tile store task finished");
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn disable(&self, error: &crate::TileError) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            log::warn!(
                "tile store failed ({}), continuing in memory only for this session",
                error
            );
        }
    }

    /// Apply one queued op. Data ops are skipped once persistence is off;
    /// flushes are always answered.
    async fn apply(&self, op: StoreOp) -> Result<()> {
        match op {
            StoreOp::Flush(done) => {
                let _ = done.send(());
                Ok(())
            }
            _ if !self.enabled.load(Ordering::SeqCst) => Ok(()),
            StoreOp::Put { key, value } => self.store.set_item(&key, value).await,
            StoreOp::Remove(keys) => match keys.as_slice() {
                [key] => self.store.remove_item(key).await,
                _ => self.store.multi_remove(&keys).await,
            },
            StoreOp::Clear => {
                let keys = self.namespaced_keys().await?;
                if keys.is_empty() {
                    Ok(())
                } else {
                    self.store.multi_remove(&keys).await
                }
            }
        }
    }

    async fn namespaced_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .get_all_keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(STORE_NAMESPACE))
            .collect())
    }

    async fn load(&self) {
        let records = match self.read_records().await {
            Ok(records) => records,
            Err(e) => {
                self.disable(&e);
                Vec::new()
            }
        };

        let now = self.clock.now_ms();
        let (restored, evicted) = {
            let mut state = self.lock();
            let tracking = std::mem::take(&mut state.load);
            let mut restored = 0;
            if !tracking.cleared {
                for (key, record) in records {
                    if tracking.touched.contains(&key) || state.entries.contains_key(&key) {
                        continue;
                    }
                    let entry = CacheEntry {
                        size_bytes: record.payload.len(),
                        payload: Arc::new(record.payload),
                        created_at: record.created_at,
                        last_accessed_at: record.last_accessed_at,
                        access_count: record.access_count.max(1),
                        priority: if record.priority.is_finite() && record.priority >= 0.0 {
                            record.priority
                        } else {
                            1.0
                        },
                        sequence: state.sequence(),
                    };
                    state.insert_entry(key, entry);
                    restored += 1;
                }
            }
            (restored, state.evict(now, false))
        };

        if !evicted.is_empty() && self.enabled.load(Ordering::SeqCst) {
            let keys: Vec<String> = evicted.iter().map(store_key).collect();
            if let Err(e) = self.store.multi_remove(&keys).await {
                self.disable(&e);
            }
        }
        log::info!("restored {} tiles from the persistent store", restored);
    }

    /// Live records from the store, oldest first. Expired and corrupt
    /// records are deleted from the store.
    async fn read_records(&self) -> Result<Vec<(TileKey, StoredEntry)>> {
        let keys = self.namespaced_keys().await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values = self.store.multi_get(&keys).await?;
        let now = self.clock.now_ms();
        let max_age = self.lock().max_age_ms();

        let mut live = Vec::new();
        let mut stale = Vec::new();
        for (raw_key, value) in values {
            let Some(value) = value else {
                continue;
            };
            let parsed = match parse_store_key(&raw_key) {
                Some(Ok(key)) => StoredEntry::from_json(&value).map(|record| (key, record)),
                Some(Err(e)) => Err(e),
                None => continue,
            };
            match parsed {
                Ok((key, record)) if now.saturating_sub(record.created_at) <= max_age => {
                    live.push((key, record));
                }
                Ok(_) => stale.push(raw_key),
                Err(e) => {
                    log::debug!("dropping unreadable store record {}: {}", raw_key, e);
                    stale.push(raw_key);
                }
            }
        }

        if !stale.is_empty() {
            log::debug!("removing {} stale tile records", stale.len());
            if let Err(e) = self.store.multi_remove(&stale).await {
                self.disable(&e);
            }
        }

        live.sort_by_key(|(_, record)| record.created_at);
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManualClock;

    fn cache_with(config: CacheConfig) -> (TileCache, ManualClock) {
        let clock = ManualClock::new(1_000_000);
        let cache = TileCache::with_clock(config, Arc::new(clock.clone()));
        (cache, clock)
    }

    fn small_config(max_size_bytes: usize) -> CacheConfig {
        CacheConfig {
            max_size_bytes,
            max_entries: 100,
            max_age: Duration::from_secs(60),
            persistent: false,
        }
    }

    fn key(x: u32) -> TileKey {
        TileKey::new(10, x, 0)
    }

    fn assert_size_consistent(cache: &TileCache) {
        let state = cache.lock();
        let sum: usize = state.entries.values().map(|e| e.size_bytes).sum();
        assert_eq!(state.total_size, sum);
    }

    #[test]
    fn test_tile_cache_basic_operations() {
        let (cache, _) = cache_with(small_config(1_000));
        assert!(cache.is_empty());

        cache.set(key(1), vec![1, 2, 3]);
        assert!(cache.has(&key(1)));
        assert_eq!(*cache.get(&key(1)).unwrap(), vec![1, 2, 3]);
        assert_eq!(cache.stats().current_size_bytes, 3);

        cache.set(key(1), vec![9; 10]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().current_size_bytes, 10);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().current_size_bytes, 0);
    }

    #[test]
    fn test_has_does_not_count_as_access() {
        let (cache, _) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 4]);
        assert!(cache.has(&key(1)));
        assert!(!cache.has(&key(2)));

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 0);
        assert_eq!(cache.lock().entries[&key(1)].access_count, 1);
    }

    #[test]
    fn test_hit_rate() {
        let (cache, _) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 4]);

        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(2)).is_none());
        assert!(cache.get(&key(1)).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate - 1.0 / 3.0).abs() < 1e-9);

        cache.reset_stats();
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn test_lazy_expiration() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 10]);
        cache.set(key(2), vec![0; 10]);

        clock.advance(Duration::from_secs(61));
        assert!(cache.get(&key(1)).is_none());
        assert!(!cache.has(&key(1)));

        // Other expired entries are left for the next sweep.
        assert!(cache.has(&key(2)));
        assert_eq!(cache.stats().current_size_bytes, 10);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_entry_at_exact_max_age_is_live() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 10]);
        clock.advance(Duration::from_secs(60));
        assert!(cache.get(&key(1)).is_some());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (cache, _) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 10]);
        cache.set(key(2), vec![0; 5]);

        cache.delete(&key(1));
        let once = cache.stats();
        cache.delete(&key(1));
        assert_eq!(cache.stats(), once);
        assert_eq!(once.entry_count, 1);
        assert_eq!(once.current_size_bytes, 5);
    }

    #[test]
    fn test_eviction_removes_oldest_without_reads() {
        let (cache, clock) = cache_with(small_config(1_000));
        let (a, b, c) = (key(1), key(2), key(3));

        cache.set(a, vec![0; 400]);
        clock.advance(Duration::from_millis(10));
        cache.set(b, vec![0; 400]);
        clock.advance(Duration::from_millis(10));
        cache.set(c, vec![0; 400]);

        assert!(!cache.has(&a));
        assert!(cache.has(&b));
        assert!(cache.has(&c));
        assert_eq!(cache.stats().current_size_bytes, 800);
    }

    #[test]
    fn test_eviction_ties_break_by_insertion_order() {
        let (cache, _) = cache_with(small_config(1_000));
        for x in 1..=3 {
            cache.set(key(x), vec![0; 400]);
        }
        assert!(!cache.has(&key(1)));
        assert!(cache.has(&key(2)));
        assert!(cache.has(&key(3)));
    }

    #[test]
    fn test_frequently_read_entry_survives() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 400]);
        clock.advance(Duration::from_millis(10));
        cache.set(key(2), vec![0; 400]);
        clock.advance(Duration::from_millis(10));
        for _ in 0..5 {
            cache.get(&key(1));
        }
        clock.advance(Duration::from_millis(10));
        cache.set(key(3), vec![0; 400]);

        assert!(cache.has(&key(1)));
        assert!(!cache.has(&key(2)));
    }

    #[test]
    fn test_priority_scales_score() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set_with_priority(key(1), vec![0; 400], 10.0);
        clock.advance(Duration::from_millis(10));
        cache.set_with_priority(key(2), vec![0; 400], 0.1);
        clock.advance(Duration::from_millis(10));
        cache.set(key(3), vec![0; 400]);

        assert!(cache.has(&key(1)));
        assert!(!cache.has(&key(2)));
    }

    #[test]
    fn test_zero_idle_score_is_finite() {
        let entry = CacheEntry {
            payload: Arc::new(vec![]),
            size_bytes: 0,
            created_at: 5,
            last_accessed_at: 5,
            access_count: 3,
            priority: 1.0,
            sequence: 1,
        };
        let score = entry.score(5);
        assert!(score.is_finite() && score > 0.0);
        assert!(entry.score(4).is_finite());
    }

    #[test]
    fn test_entry_limit_evicts_least_valuable() {
        let config = CacheConfig {
            max_entries: 10,
            ..small_config(1_000_000)
        };
        let (cache, clock) = cache_with(config);
        for x in 0..11 {
            cache.set(key(x), vec![0; 10]);
            clock.advance(Duration::from_millis(1));
        }

        // Bytes are far below the watermark, so the batch ends at the limit
        assert_eq!(cache.len(), 10);
        assert!(!cache.has(&key(0)));
        assert!(cache.has(&key(10)));
    }

    #[test]
    fn test_byte_pressure_batches_thirty_percent() {
        let (cache, clock) = cache_with(small_config(1_000));
        for x in 0..10 {
            cache.set(key(x), vec![0; 100]);
            clock.advance(Duration::from_millis(1));
        }
        cache.set(key(10), vec![0; 100]);

        // ceil(11 * 0.3) = 4, cut short once 800 bytes is reached
        assert_eq!(cache.stats().current_size_bytes, 800);
        for x in 0..3 {
            assert!(!cache.has(&key(x)));
        }
    }

    #[test]
    fn test_sweep_precedes_scoring() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 300]);
        clock.advance(Duration::from_secs(59));
        cache.set(key(2), vec![0; 300]);
        clock.advance(Duration::from_secs(2));
        cache.set(key(3), vec![0; 300]);
        cache.set(key(4), vec![0; 300]);

        // key 1 expired and is swept; the rest fit again
        assert!(!cache.has(&key(1)));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().current_size_bytes, 900);
    }

    #[test]
    fn test_oversized_payload_not_cached() {
        let (cache, _) = cache_with(small_config(100));
        cache.set(key(1), vec![0; 50]);
        cache.set(key(2), vec![0; 101]);

        assert!(!cache.has(&key(2)));
        assert!(cache.has(&key(1)));
    }

    #[test]
    fn test_oversized_overwrite_drops_previous_payload() {
        let (cache, _) = cache_with(small_config(100));
        cache.set(key(1), vec![1; 10]);
        cache.set(key(1), vec![2; 101]);

        assert!(cache.get(&key(1)).is_none());
        assert!(!cache.has(&key(1)));
        assert_eq!(cache.stats().current_size_bytes, 0);
        assert_size_consistent(&cache);
    }

    #[test]
    fn test_set_max_size_evicts_immediately() {
        let (cache, clock) = cache_with(small_config(1_000));
        for x in 0..5 {
            cache.set(key(x), vec![0; 100]);
            clock.advance(Duration::from_millis(1));
        }
        cache.set_max_size(250);

        let stats = cache.stats();
        assert!(stats.current_size_bytes <= 250);
        assert_eq!(stats.max_size_bytes, 250);
        assert!(cache.has(&key(4)));
    }

    #[test]
    fn test_set_max_age_sweeps_immediately() {
        let (cache, clock) = cache_with(small_config(1_000));
        cache.set(key(1), vec![0; 10]);
        clock.advance(Duration::from_secs(10));
        cache.set(key(2), vec![0; 10]);
        clock.advance(Duration::from_secs(1));

        cache.set_max_age(Duration::from_secs(5));
        assert!(!cache.has(&key(1)));
        assert!(cache.has(&key(2)));
        assert_eq!(cache.config().max_age, Duration::from_secs(5));
    }

    #[test]
    fn test_size_never_exceeds_ceiling() {
        let (cache, clock) = cache_with(CacheConfig {
            max_entries: 40,
            ..small_config(5_000)
        });

        // Small LCG so the sequence is deterministic
        let mut seed: u64 = 42;
        for i in 0..500u32 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let size = (seed >> 33) as usize % 700 + 1;
            let x = (seed >> 20) as u32 % 64;
            match i % 7 {
                0 => cache.delete(&key(x)),
                1 | 2 => {
                    cache.get(&key(x));
                }
                _ => cache.set(key(x), vec![0; size]),
            }
            clock.advance(Duration::from_millis((seed % 5) as u64));

            let stats = cache.stats();
            assert!(stats.current_size_bytes <= 5_000);
            assert!(stats.entry_count <= 40);
            assert_size_consistent(&cache);
        }
    }

    #[test]
    fn test_memory_only_is_loaded() {
        let cache = TileCache::with_store(CacheConfig::default(), None);
        assert!(cache.is_loaded());
        assert!(!cache.is_persistent());
    }
}
