//! Configuration for the tile cache and preloader
//!
//! Mirrors the map engine's profile system: pick a [`PreloadProfile`] preset or
//! supply custom options, then resolve it into concrete cache and preloader
//! settings. Every type here is serde-(de)serializable; durations are stored as
//! milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::constants::{DEFAULT_REQUEST_TIMEOUT_MS, MAX_RADIUS_IN_TILES};
use crate::{Result, TileError};

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Limits enforced by the tile cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Ceiling on the summed payload size of live entries
    pub max_size_bytes: usize,
    /// Ceiling on the number of live entries
    pub max_entries: usize,
    /// Entries older than this (since creation) are treated as absent
    #[serde(rename = "max_age_ms", with = "duration_ms")]
    pub max_age: Duration,
    /// Mirror entries to the persistent store when one is supplied
    pub persistent: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            max_entries: 2_000,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            persistent: true,
        }
    }
}

impl CacheConfig {
    /// Memory-only cache with the default limits
    pub fn memory_only() -> Self {
        Self {
            persistent: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(TileError::InvalidInput("max_size_bytes must be positive".into()));
        }
        if self.max_entries == 0 {
            return Err(TileError::InvalidInput("max_entries must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration for the tile preloader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloaderConfig {
    /// Maximum simultaneous fetches per preloader
    pub max_concurrent_downloads: usize,
    /// Per-fetch timeout
    #[serde(rename = "request_timeout_ms", with = "duration_ms")]
    pub request_timeout: Duration,
    /// Pause each worker takes after a download
    #[serde(rename = "download_delay_ms", with = "duration_ms")]
    pub download_delay: Duration,
    /// Largest radius accepted by area preloads
    pub max_radius_in_tiles: u32,
    /// Spacing of sample points along a route segment
    pub route_sample_step_meters: f64,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 4,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            download_delay: Duration::from_millis(50),
            max_radius_in_tiles: 16,
            route_sample_step_meters: 100.0,
        }
    }
}

/// Unified configuration presets for PreloaderConfig
impl PreloaderConfig {
    pub fn low_bandwidth() -> Self {
        Self {
            max_concurrent_downloads: 2,
            download_delay: Duration::from_millis(200),
            max_radius_in_tiles: 4,
            ..Default::default()
        }
    }

    pub fn aggressive() -> Self {
        Self {
            max_concurrent_downloads: 8,
            download_delay: Duration::ZERO,
            max_radius_in_tiles: 32,
            ..Default::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            max_concurrent_downloads: 2,
            request_timeout: Duration::from_millis(500),
            download_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(TileError::InvalidInput(
                "max_concurrent_downloads must be positive".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(TileError::InvalidInput("request_timeout must be positive".into()));
        }
        if self.max_radius_in_tiles > MAX_RADIUS_IN_TILES {
            return Err(TileError::InvalidInput(format!(
                "max_radius_in_tiles must be at most {}",
                MAX_RADIUS_IN_TILES
            )));
        }
        if !(self.route_sample_step_meters.is_finite() && self.route_sample_step_meters > 0.0) {
            return Err(TileError::InvalidInput(
                "route_sample_step_meters must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// Combined settings for a cache/preloader pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSubsystemConfig {
    pub cache: CacheConfig,
    pub preloader: PreloaderConfig,
}

impl TileSubsystemConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.preloader.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PreloadProfile {
    #[default]
    Balanced,
    LowBandwidth,
    Aggressive,
    Custom(TileSubsystemConfig),
}

impl PreloadProfile {
    pub fn resolve(&self) -> TileSubsystemConfig {
        match self {
            Self::Balanced => TileSubsystemConfig::default(),
            Self::LowBandwidth => TileSubsystemConfig {
                cache: CacheConfig {
                    max_size_bytes: 20 * 1024 * 1024,
                    max_entries: 800,
                    ..Default::default()
                },
                preloader: PreloaderConfig::low_bandwidth(),
            },
            Self::Aggressive => TileSubsystemConfig {
                cache: CacheConfig {
                    max_size_bytes: 200 * 1024 * 1024,
                    max_entries: 8_000,
                    ..Default::default()
                },
                preloader: PreloaderConfig::aggressive(),
            },
            Self::Custom(config) => config.clone(),
        }
    }
}
