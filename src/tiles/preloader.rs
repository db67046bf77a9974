//! Bulk tile preloading
//!
//! A [`TilePreloader`] turns a geographic target into an ordered queue of
//! tile requests and drains it with a fixed pool of workers. Each worker
//! holds one [`DownloadSlot`](crate::runtime::async_utils::DownloadSlot) while
//! it talks to the network, so at most `max_concurrent_downloads` fetches run
//! at once. Requests for tiles already being fetched (by this preloader or any
//! other on the same cache) wait for that fetch instead of starting another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::cache::TileCache;
use super::coalesce::{wait_for_outcome, FetchOutcome, Registration, RequestCoalescer};
use super::loader::TileFetcher;
use super::source::TileSource;
use crate::core::config::PreloaderConfig;
use crate::core::constants::MAX_ZOOM;
use crate::core::geo::{corridor_radius_in_tiles, LatLng, LatLngBounds, TileKey};
use crate::prelude::{HashMap, HashSet};
use crate::runtime::async_utils::{async_delay, DownloadSemaphore};
use crate::{Result, TileError};

/// Called after every finished tile with the running totals
pub type ProgressCallback = Arc<dyn Fn(&PreloadProgress) + Send + Sync>;

/// Outcome of one preload batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreloadProgress {
    /// Tiles queued for download after skipping cached ones
    pub total: usize,
    pub loaded: usize,
    pub errors: usize,
    /// Candidate tiles that were already in the cache
    pub already_cached: usize,
    /// The batch stopped before every queued tile was attempted
    pub cancelled: bool,
    pub progress_percent: f64,
}

impl PreloadProgress {
    fn new(total: usize, already_cached: usize) -> Self {
        let mut progress = Self {
            total,
            already_cached,
            ..Default::default()
        };
        progress.update_percent();
        progress
    }

    pub fn finished(&self) -> usize {
        self.loaded + self.errors
    }

    fn update_percent(&mut self) {
        self.progress_percent = if self.total == 0 {
            100.0
        } else {
            self.finished() as f64 / self.total as f64 * 100.0
        };
    }
}

/// A queued tile download
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadRequest {
    pub key: TileKey,
    pub url: String,
    /// Cache priority the tile is stored with
    pub priority: f64,
}

/// Queue and cancellation scope of one preload call
#[derive(Debug)]
struct Batch {
    queue: Mutex<VecDeque<PreloadRequest>>,
    cancel: CancellationToken,
    stopped: AtomicBool,
}

impl Batch {
    fn queue(&self) -> MutexGuard<'_, VecDeque<PreloadRequest>> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn pop(&self) -> Option<PreloadRequest> {
        self.queue().pop_front()
    }

    /// Drop everything still queued
    fn stop(&self) -> usize {
        self.stopped.store(true, Ordering::SeqCst);
        let mut queue = self.queue();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    fn len(&self) -> usize {
        self.queue().len()
    }
}

/// Unregisters a batch when its preload call returns or is dropped
struct ActiveBatch<'a> {
    preloader: &'a TilePreloader,
    batch: Arc<Batch>,
}

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        self.batch.stop();
        let mut current = lock(&self.preloader.current);
        if current
            .as_ref()
            .map(|batch| Arc::ptr_eq(batch, &self.batch))
            .unwrap_or(false)
        {
            *current = None;
        }
        self.preloader.active_batches.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Warms a [`TileCache`] around points, boxes and routes
pub struct TilePreloader {
    cache: TileCache,
    fetcher: Arc<dyn TileFetcher>,
    config: PreloaderConfig,
    semaphore: DownloadSemaphore,
    coalescer: Arc<RequestCoalescer>,
    /// Parent of every batch token; replaced after each cancel
    root_cancel: Mutex<CancellationToken>,
    current: Mutex<Option<Arc<Batch>>>,
    active_batches: AtomicUsize,
}

impl TilePreloader {
    pub fn new(cache: TileCache, fetcher: Arc<dyn TileFetcher>, config: PreloaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            coalescer: cache.coalescer(),
            semaphore: DownloadSemaphore::new(config.max_concurrent_downloads),
            cache,
            fetcher,
            config,
            root_cancel: Mutex::new(CancellationToken::new()),
            current: Mutex::new(None),
            active_batches: AtomicUsize::new(0),
        })
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn config(&self) -> &PreloaderConfig {
        &self.config
    }

    /// Fetches currently holding a download slot
    pub fn active_downloads(&self) -> usize {
        self.semaphore.in_use()
    }

    /// Preload every tile within `radius_in_tiles` of the tile containing `center`
    pub async fn preload_area(
        &self,
        center: LatLng,
        zoom: u8,
        radius_in_tiles: u32,
        source: &dyn TileSource,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PreloadProgress> {
        let candidates = self.area_keys(center, zoom, radius_in_tiles)?;
        let center_key = TileKey::from_lat_lng(&center, zoom);
        let candidates = candidates
            .into_iter()
            .map(|key| (key, ring_priority(&key, &center_key)))
            .collect();
        Ok(self.run_batch(candidates, source, on_progress).await)
    }

    /// Candidate keys for an area preload, center-outward, before cache filtering
    pub fn area_keys(&self, center: LatLng, zoom: u8, radius_in_tiles: u32) -> Result<Vec<TileKey>> {
        validate_point(&center)?;
        validate_zoom(zoom)?;
        if radius_in_tiles > self.config.max_radius_in_tiles {
            return Err(TileError::InvalidInput(format!(
                "radius of {} tiles exceeds the limit of {}",
                radius_in_tiles, self.config.max_radius_in_tiles
            )));
        }
        Ok(TileKey::from_lat_lng(&center, zoom).neighborhood(radius_in_tiles))
    }

    /// Preload every tile covering `bounds`, nearest to the box center first
    pub async fn preload_bounds(
        &self,
        bounds: LatLngBounds,
        zoom: u8,
        source: &dyn TileSource,
        on_progress: Option<ProgressCallback>,
    ) -> Result<PreloadProgress> {
        if !bounds.is_valid() {
            return Err(TileError::InvalidCoordinates(format!("{:?}", bounds)));
        }
        validate_zoom(zoom)?;

        let north_west = TileKey::from_lat_lng(
            &LatLng::new(bounds.north_east.lat, bounds.south_west.lng),
            zoom,
        );
        let south_east = TileKey::from_lat_lng(
            &LatLng::new(bounds.south_west.lat, bounds.north_east.lng),
            zoom,
        );
        let count = (south_east.x - north_west.x + 1) as u64 * (south_east.y - north_west.y + 1) as u64;
        let limit = (2 * self.config.max_radius_in_tiles as u64 + 1).saturating_pow(2);
        if count > limit {
            return Err(TileError::InvalidInput(format!(
                "bounds cover {} tiles at zoom {}, more than the limit of {}",
                count, zoom, limit
            )));
        }

        let mut keys = TileKey::tiles_in_bounds(&bounds, zoom);

        let center = TileKey::from_lat_lng(&bounds.center(), zoom);
        keys.sort_by_key(|key| {
            let dx = key.x as i64 - center.x as i64;
            let dy = key.y as i64 - center.y as i64;
            (key.ring_distance(&center), dx * dx + dy * dy, key.y, key.x)
        });
        let candidates = keys
            .into_iter()
            .map(|key| (key, ring_priority(&key, &center)))
            .collect();
        Ok(self.run_batch(candidates, source, on_progress).await)
    }

    /// Preload a corridor `corridor_meters` wide on each side of a route
    pub async fn preload_route(
        &self,
        coordinates: &[LatLng],
        zoom: u8,
        corridor_meters: f64,
        source: &dyn TileSource,
    ) -> Result<PreloadProgress> {
        let candidates = self.route_keys(coordinates, zoom, corridor_meters)?;
        Ok(self.run_batch(candidates, source, None).await)
    }

    /// Deduplicated corridor keys in route order, with cache priorities
    pub fn route_keys(
        &self,
        coordinates: &[LatLng],
        zoom: u8,
        corridor_meters: f64,
    ) -> Result<Vec<(TileKey, f64)>> {
        if coordinates.is_empty() {
            return Err(TileError::InvalidInput("route has no coordinates".into()));
        }
        for point in coordinates {
            validate_point(point)?;
        }
        validate_zoom(zoom)?;
        if !(corridor_meters.is_finite() && corridor_meters >= 0.0) {
            return Err(TileError::InvalidInput(format!(
                "corridor width must be a non-negative number of meters, got {}",
                corridor_meters
            )));
        }

        let mut order: Vec<TileKey> = Vec::new();
        let mut priorities: HashMap<TileKey, f64> = HashMap::default();
        for sample in sample_route(coordinates, self.config.route_sample_step_meters) {
            let center = TileKey::from_lat_lng(&sample, zoom);
            let radius = corridor_radius_in_tiles(corridor_meters, sample.lat, zoom)
                .min(self.config.max_radius_in_tiles);
            for key in center.neighborhood(radius) {
                let priority = ring_priority(&key, &center);
                match priorities.get_mut(&key) {
                    Some(existing) => *existing = existing.max(priority),
                    None => {
                        priorities.insert(key, priority);
                        order.push(key);
                    }
                }
            }
        }

        Ok(order
            .into_iter()
            .map(|key| {
                let priority = priorities.get(&key).copied().unwrap_or(1.0);
                (key, priority)
            })
            .collect())
    }

    /// Abort everything: queued requests are dropped and in-flight fetches stop.
    pub fn cancel_preloading(&self) {
        let mut root = lock(&self.root_cancel);
        let previous = std::mem::replace(&mut *root, CancellationToken::new());
        previous.cancel();

        if let Some(batch) = lock(&self.current).take() {
            let dropped = batch.stop();
            log::info!("preloading cancelled, {} queued tiles dropped", dropped);
        }
    }

    pub fn is_preloading(&self) -> bool {
        self.active_batches.load(Ordering::SeqCst) > 0
    }

    /// Requests of the current batch not yet picked up by a worker
    pub fn queue_size(&self) -> usize {
        lock(&self.current)
            .as_ref()
            .map(|batch| batch.len())
            .unwrap_or(0)
    }

    /// Register a new batch, superseding whatever is queued
    fn start_batch(&self, requests: VecDeque<PreloadRequest>) -> Arc<Batch> {
        let root = lock(&self.root_cancel);
        let batch = Arc::new(Batch {
            queue: Mutex::new(requests),
            cancel: root.child_token(),
            stopped: AtomicBool::new(false),
        });
        self.active_batches.fetch_add(1, Ordering::SeqCst);

        if let Some(previous) = lock(&self.current).replace(batch.clone()) {
            let dropped = previous.stop();
            if dropped > 0 {
                log::debug!("superseded preload batch, {} queued tiles dropped", dropped);
            }
        }
        batch
    }

    async fn run_batch(
        &self,
        candidates: Vec<(TileKey, f64)>,
        source: &dyn TileSource,
        on_progress: Option<ProgressCallback>,
    ) -> PreloadProgress {
        let mut seen = HashSet::default();
        let mut already_cached = 0;
        let mut requests = VecDeque::new();
        for (key, priority) in candidates {
            if !seen.insert(key) {
                continue;
            }
            if self.cache.has(&key) {
                already_cached += 1;
                continue;
            }
            requests.push_back(PreloadRequest {
                key,
                url: source.url(key),
                priority,
            });
        }

        let total = requests.len();
        let progress = Mutex::new(PreloadProgress::new(total, already_cached));
        let active = ActiveBatch {
            preloader: self,
            batch: self.start_batch(requests),
        };
        log::debug!("preloading {} tiles ({} already cached)", total, already_cached);

        let workers = self.config.max_concurrent_downloads.min(total);
        join_all((0..workers).map(|_| self.worker(&active.batch, &progress, on_progress.as_ref()))).await;

        let stopped = active.batch.stopped.load(Ordering::SeqCst) || active.batch.cancel.is_cancelled();
        drop(active);

        let mut result = match progress.into_inner() {
            Ok(progress) => progress,
            Err(poisoned) => poisoned.into_inner(),
        };
        result.cancelled = stopped && result.finished() < result.total;
        log::info!(
            "preload finished: {} loaded, {} errors, {} already cached of {} tiles{}",
            result.loaded,
            result.errors,
            result.already_cached,
            result.total + result.already_cached,
            if result.cancelled { " (cancelled)" } else { "" }
        );
        result
    }

    async fn worker(
        &self,
        batch: &Batch,
        progress: &Mutex<PreloadProgress>,
        on_progress: Option<&ProgressCallback>,
    ) {
        while !batch.cancel.is_cancelled() {
            let Some(request) = batch.pop() else {
                break;
            };

            let (outcome, downloaded) = self.load_tile(&request, &batch.cancel).await;
            if outcome == FetchOutcome::Cancelled {
                break;
            }

            let snapshot = {
                let mut progress = lock(progress);
                match outcome {
                    FetchOutcome::Loaded => progress.loaded += 1,
                    _ => progress.errors += 1,
                }
                progress.update_percent();
                progress.clone()
            };
            if let Some(callback) = on_progress {
                callback(&snapshot);
            }

            if downloaded && !async_delay(self.config.download_delay, &batch.cancel).await {
                break;
            }
        }
    }

    /// Make sure one tile ends up in the cache. The flag reports whether this
    /// call went to the network itself.
    async fn load_tile(&self, request: &PreloadRequest, cancel: &CancellationToken) -> (FetchOutcome, bool) {
        loop {
            if self.cache.has(&request.key) {
                return (FetchOutcome::Loaded, false);
            }

            match self.coalescer.register(request.key) {
                Registration::Follower(receiver) => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return (FetchOutcome::Cancelled, false),
                        outcome = wait_for_outcome(receiver) => outcome,
                    };
                    match outcome {
                        FetchOutcome::Cancelled => continue,
                        outcome => return (outcome, false),
                    }
                }
                Registration::Leader(guard) => {
                    // The previous leader may have finished since the check above.
                    if self.cache.has(&request.key) {
                        guard.complete(FetchOutcome::Loaded);
                        return (FetchOutcome::Loaded, false);
                    }
                    let Some(_slot) = self.semaphore.acquire(cancel).await else {
                        return (FetchOutcome::Cancelled, false);
                    };
                    let outcome = self.download(request, cancel).await;
                    guard.complete(outcome);
                    return (outcome, outcome != FetchOutcome::Cancelled);
                }
            }
        }
    }

    async fn download(&self, request: &PreloadRequest, cancel: &CancellationToken) -> FetchOutcome {
        let timeout = self.config.request_timeout;
        let fetch = tokio::time::timeout(timeout, self.fetcher.fetch(&request.url));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("fetch of tile {} cancelled", request.key);
                FetchOutcome::Cancelled
            }
            result = fetch => match result {
                Ok(Ok(payload)) => {
                    log::debug!("tile {} loaded ({} bytes)", request.key, payload.len());
                    self.cache.set_with_priority(request.key, payload, request.priority);
                    FetchOutcome::Loaded
                }
                Ok(Err(e)) => {
                    log::debug!("tile {} failed: {}", request.key, e);
                    FetchOutcome::Failed
                }
                Err(_) => {
                    log::debug!("tile {} failed: {}", request.key, TileError::Timeout(timeout));
                    FetchOutcome::Failed
                }
            }
        }
    }
}

impl std::fmt::Debug for TilePreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TilePreloader")
            .field("config", &self.config)
            .field("is_preloading", &self.is_preloading())
            .field("queue_size", &self.queue_size())
            .finish()
    }
}

fn ring_priority(key: &TileKey, center: &TileKey) -> f64 {
    1.0 / (1.0 + key.ring_distance(center) as f64)
}

fn validate_point(point: &LatLng) -> Result<()> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(TileError::InvalidCoordinates(format!(
            "({}, {}) is not a valid latitude/longitude",
            point.lat, point.lng
        )))
    }
}

fn validate_zoom(zoom: u8) -> Result<()> {
    if zoom > MAX_ZOOM {
        return Err(TileError::InvalidInput(format!(
            "zoom {} is above the maximum of {}",
            zoom, MAX_ZOOM
        )));
    }
    Ok(())
}

/// Points along the route, at most `step_meters` apart, endpoints included
fn sample_route(coordinates: &[LatLng], step_meters: f64) -> Vec<LatLng> {
    let mut samples = Vec::new();
    for pair in coordinates.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        let steps = (from.distance_to(to) / step_meters).ceil().max(1.0) as usize;
        for i in 0..steps {
            samples.push(from.lerp(to, i as f64 / steps as f64));
        }
    }
    if let Some(last) = coordinates.last() {
        samples.push(*last);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::core::constants::MAX_RADIUS_IN_TILES;
    use crate::tiles::source::UrlTemplate;
    use async_trait::async_trait;

    struct EchoFetcher;

    #[async_trait]
    impl TileFetcher for EchoFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Ok(url.as_bytes().to_vec())
        }
    }

    fn preloader() -> TilePreloader {
        TilePreloader::new(
            TileCache::new(CacheConfig::memory_only()),
            Arc::new(EchoFetcher),
            PreloaderConfig::for_testing(),
        )
        .unwrap()
    }

    fn source() -> UrlTemplate {
        UrlTemplate::new("https://tiles.test/{z}/{x}/{y}.png").unwrap()
    }

    #[test]
    fn test_area_keys_paris() {
        let keys = preloader()
            .area_keys(LatLng::new(48.8566, 2.3522), 12, 2)
            .unwrap();
        assert_eq!(keys.len(), 25);
        assert_eq!(keys[0], TileKey::new(12, 2074, 1409));
        assert!(keys.iter().all(|key| key.is_valid()));
    }

    #[test]
    fn test_area_keys_clipped_at_grid_edge() {
        let keys = preloader().area_keys(LatLng::new(85.0, -180.0), 1, 2).unwrap();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_invalid_area_input() {
        let preloader = preloader();
        assert!(matches!(
            preloader.area_keys(LatLng::new(f64::NAN, 0.0), 5, 1),
            Err(TileError::InvalidCoordinates(_))
        ));
        assert!(matches!(
            preloader.area_keys(LatLng::new(0.0, 0.0), 30, 1),
            Err(TileError::InvalidInput(_))
        ));
        assert!(matches!(
            preloader.area_keys(LatLng::new(0.0, 0.0), 5, 100),
            Err(TileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sample_route_spacing() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(0.0, 0.01);
        let samples = sample_route(&[a, b], 100.0);
        // ~1113 m at the equator
        assert_eq!(samples.len(), 13);
        assert_eq!(samples[0], a);
        assert_eq!(*samples.last().unwrap(), b);
        for pair in samples.windows(2) {
            assert!(pair[0].distance_to(&pair[1]) <= 100.0);
        }

        assert_eq!(sample_route(&[a], 100.0), vec![a]);
    }

    #[test]
    fn test_route_keys_are_unique_and_cover_endpoints() {
        let preloader = preloader();
        let route = [LatLng::new(48.85, 2.30), LatLng::new(48.86, 2.40)];
        let keys = preloader.route_keys(&route, 14, 200.0).unwrap();

        let unique: HashSet<TileKey> = keys.iter().map(|(key, _)| *key).collect();
        assert_eq!(unique.len(), keys.len());
        for point in &route {
            assert!(unique.contains(&TileKey::from_lat_lng(point, 14)));
        }
        assert!(keys.iter().all(|(_, priority)| *priority > 0.0 && *priority <= 1.0));
    }

    #[test]
    fn test_invalid_route_input() {
        let preloader = preloader();
        assert!(matches!(preloader.route_keys(&[], 10, 100.0), Err(TileError::InvalidInput(_))));
        assert!(preloader
            .route_keys(&[LatLng::new(0.0, 0.0)], 10, -1.0)
            .is_err());
        assert!(preloader
            .route_keys(&[LatLng::new(0.0, 0.0)], 10, f64::INFINITY)
            .is_err());
        assert!(preloader
            .route_keys(&[LatLng::new(0.0, 0.0), LatLng::new(91.0, 0.0)], 10, 10.0)
            .is_err());
    }

    #[tokio::test]
    async fn test_preload_area_fills_cache() {
        let preloader = preloader();
        let progress = preloader
            .preload_area(LatLng::new(48.8566, 2.3522), 12, 1, &source(), None)
            .await
            .unwrap();

        assert_eq!(progress.total, 9);
        assert_eq!(progress.loaded, 9);
        assert_eq!(progress.errors, 0);
        assert!(!progress.cancelled);
        assert_eq!(progress.progress_percent, 100.0);
        assert_eq!(preloader.cache().len(), 9);
        assert!(!preloader.is_preloading());
        assert_eq!(preloader.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_bounds_with_largest_radius() {
        let preloader = TilePreloader::new(
            TileCache::new(CacheConfig::memory_only()),
            Arc::new(EchoFetcher),
            PreloaderConfig {
                max_radius_in_tiles: MAX_RADIUS_IN_TILES,
                ..PreloaderConfig::for_testing()
            },
        )
        .unwrap();

        let progress = preloader
            .preload_bounds(LatLngBounds::from_coords(0.5, 0.5, 1.0, 1.0), 3, &source(), None)
            .await
            .unwrap();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.loaded, 1);
    }

    #[test]
    fn test_unbounded_radius_rejected() {
        let result = TilePreloader::new(
            TileCache::new(CacheConfig::memory_only()),
            Arc::new(EchoFetcher),
            PreloaderConfig {
                max_radius_in_tiles: u32::MAX,
                ..PreloaderConfig::for_testing()
            },
        );
        assert!(matches!(result, Err(TileError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_cached_tiles_are_skipped() {
        let preloader = preloader();
        preloader.cache().set(TileKey::new(12, 2074, 1409), vec![1]);

        let progress = preloader
            .preload_area(LatLng::new(48.8566, 2.3522), 12, 1, &source(), None)
            .await
            .unwrap();
        assert_eq!(progress.total, 8);
        assert_eq!(progress.already_cached, 1);
        assert_eq!(progress.loaded, 8);
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let preloader = preloader();
        let point = LatLng::new(10.0, 10.0);
        preloader.cache().set(TileKey::from_lat_lng(&point, 3), vec![1]);
        let progress = preloader
            .preload_area(point, 3, 0, &source(), None)
            .await
            .unwrap();
        assert_eq!(progress.total, 0);
        assert_eq!(progress.already_cached, 1);
        assert_eq!(progress.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn test_center_tile_gets_highest_cache_priority() {
        let preloader = preloader();
        preloader
            .preload_area(LatLng::new(48.8566, 2.3522), 12, 1, &source(), None)
            .await
            .unwrap();
        let center = TileKey::new(12, 2074, 1409);
        assert!(preloader.cache().has(&center));
        assert_eq!(ring_priority(&center, &center), 1.0);
        assert_eq!(ring_priority(&TileKey::new(12, 2075, 1409), &center), 0.5);
    }

    #[test]
    fn test_cancel_when_idle() {
        let preloader = preloader();
        preloader.cancel_preloading();
        preloader.cancel_preloading();
        assert!(!preloader.is_preloading());
        assert_eq!(preloader.queue_size(), 0);
    }
}
