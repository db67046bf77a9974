//! # maplet-tiles
//!
//! The tile cache and preloading subsystem of the maplet map engine.
//!
//! Downloaded raster tiles are kept in a bounded [`TileCache`] that evicts by
//! age and by a recency × frequency score, optionally mirroring its entries to
//! a persistent key-value store. A [`TilePreloader`] warms the cache around a
//! point, across a bounding box, or along a route corridor, using a bounded
//! number of concurrent downloads that can be cancelled at any time.
//!
//! ```rust,no_run
//! use maplet_tiles::prelude::*;
//!
//! # async fn run() -> maplet_tiles::Result<()> {
//! let cache = TileCache::new(CacheConfig::memory_only());
//! let preloader = TilePreloader::new(
//!     cache.clone(),
//!     Arc::new(HttpTileFetcher::new()),
//!     PreloaderConfig::default(),
//! )?;
//!
//! let source = UrlTemplate::new("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")?;
//! let progress = preloader
//!     .preload_area(LatLng::new(48.8566, 2.3522), 12, 2, &source, None)
//!     .await?;
//! println!("{} of {} tiles loaded", progress.loaded, progress.total);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod prelude;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{CacheConfig, PreloadProfile, PreloaderConfig, TileSubsystemConfig},
    geo::{LatLng, LatLngBounds, TileKey},
};

pub use tiles::{
    cache::{CacheStats, TileCache},
    coalesce::RequestCoalescer,
    loader::TileFetcher,
    preloader::{PreloadProgress, TilePreloader},
    source::{OpenStreetMapSource, TileSource, UrlTemplate},
    store::{MemoryStore, TileStore},
};

#[cfg(feature = "http")]
pub use tiles::loader::HttpTileFetcher;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, TileError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error type alias for convenience
pub type Error = TileError;
