//! Core constants derived from common web-map conventions.
//! Keeping them in a single place makes it easier to tweak subsystem-wide magic numbers.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level accepted by the preloader.
pub const MAX_ZOOM: u8 = 22;

/// Largest preload radius a config may ask for; covers the whole grid at `MAX_ZOOM`.
pub const MAX_RADIUS_IN_TILES: u32 = 1 << MAX_ZOOM;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// Equatorial circumference used by the meters-per-pixel factor.
pub const EARTH_CIRCUMFERENCE_METERS: f64 = 40_075_017.0;

/// Mean earth radius for haversine distances.
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Prefix shared by every key the cache writes to a persistent store.
pub const STORE_NAMESPACE: &str = "@maplet_tiles:";

/// Fraction of entries removed per score-based eviction batch.
pub const EVICTION_BATCH_FRACTION: f64 = 0.3;

/// Byte level (relative to the ceiling) at which an eviction batch may stop early.
pub const EVICTION_LOW_WATERMARK: f64 = 0.8;

/// Idle time substituted for entries touched in the current millisecond.
pub const MIN_IDLE_MS: f64 = 1e-3;

/// Default per-fetch timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default subdomains substituted for `{s}` in URL templates.
pub const DEFAULT_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];
