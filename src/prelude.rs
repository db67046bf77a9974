//! Prelude module for common maplet-tiles types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maplet_tiles::prelude::*;`

pub use crate::core::{
    config::{CacheConfig, PreloadProfile, PreloaderConfig, TileSubsystemConfig},
    geo::{LatLng, LatLngBounds, TileKey},
};

pub use crate::runtime::{
    async_utils::{DownloadSemaphore, DownloadSlot},
    Clock, ManualClock, SystemClock,
};

pub use crate::tiles::{
    cache::{CacheStats, TileCache},
    coalesce::{CoalescerStats, FetchOutcome, RequestCoalescer},
    loader::TileFetcher,
    preloader::{PreloadProgress, ProgressCallback, TilePreloader},
    source::{OpenStreetMapSource, TileSource, UrlTemplate},
    store::{MemoryStore, StoredEntry, TileStore},
};

#[cfg(feature = "http")]
pub use crate::tiles::loader::HttpTileFetcher;

pub use crate::{Error as TileError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
