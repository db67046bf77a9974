use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::core::constants::{
    EARTH_CIRCUMFERENCE_METERS, EARTH_RADIUS_METERS, MAX_LATITUDE, TILE_SIZE,
};
use crate::{Result, TileError};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are finite and within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Calculates the distance to another LatLng using the Haversine formula
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_METERS * c
    }

    /// Linear interpolation toward `other`; `t = 0` is `self`, `t = 1` is `other`
    pub fn lerp(&self, other: &LatLng, t: f64) -> LatLng {
        LatLng::new(
            self.lat + (other.lat - self.lat) * t,
            self.lng + (other.lng - self.lng) * t,
        )
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Checks if the bounds contain a point
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat <= self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng <= self.north_east.lng
    }

    /// Extends the bounds to include a point
    pub fn extend(&mut self, point: &LatLng) {
        self.south_west.lat = self.south_west.lat.min(point.lat);
        self.south_west.lng = self.south_west.lng.min(point.lng);
        self.north_east.lat = self.north_east.lat.max(point.lat);
        self.north_east.lng = self.north_east.lng.max(point.lng);
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    /// Both corners valid and correctly ordered
    pub fn is_valid(&self) -> bool {
        self.south_west.is_valid()
            && self.north_east.is_valid()
            && self.south_west.lat <= self.north_east.lat
            && self.south_west.lng <= self.north_east.lng
    }
}

/// Identifies a tile in the slippy map tile system.
///
/// Serialized as `"{z}-{x}-{y}"`, which is the key used by the cache and the
/// persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Largest valid column/row index at `zoom`
    pub fn max_index(zoom: u8) -> u32 {
        if zoom >= 32 {
            return u32::MAX;
        }
        ((1u64 << zoom) - 1) as u32
    }

    /// Creates a tile key from a LatLng and zoom level
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        let lat_rad = LatLng::clamp_lat(lat_lng.lat).to_radians();
        let n = 2_f64.powi(zoom as i32);
        let max = Self::max_index(zoom) as f64;

        let x = ((lat_lng.lng + 180.0) / 360.0 * n).floor().clamp(0.0, max) as u32;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
            .floor()
            .clamp(0.0, max) as u32;

        Self::new(zoom, x, y)
    }

    /// Converts the tile key to LatLng (northwest corner)
    pub fn to_lat_lng(&self) -> LatLng {
        let n = 2_f64.powi(self.z as i32);
        let lng = self.x as f64 / n * 360.0 - 180.0;
        let lat_rad = (PI * (1.0 - 2.0 * self.y as f64 / n)).sinh().atan();

        LatLng::new(lat_rad.to_degrees(), lng)
    }

    /// Checks if the indices are valid for the key's zoom level
    pub fn is_valid(&self) -> bool {
        let max = Self::max_index(self.z);
        self.x <= max && self.y <= max
    }

    /// Chebyshev ring this key sits on relative to `center`
    pub fn ring_distance(&self, center: &TileKey) -> u32 {
        self.x.abs_diff(center.x).max(self.y.abs_diff(center.y))
    }

    /// All keys within Chebyshev distance `radius`, clipped to the grid and
    /// ordered center-outward.
    pub fn neighborhood(&self, radius: u32) -> Vec<TileKey> {
        let max = Self::max_index(self.z) as i64;
        let r = radius as i64;
        let (cx, cy) = (self.x as i64, self.y as i64);

        let (x0, x1) = ((cx - r).max(0), (cx + r).min(max));
        let (y0, y1) = ((cy - r).max(0), (cy + r).min(max));

        let mut keys = Vec::with_capacity(((x1 - x0 + 1) as u64).saturating_mul((y1 - y0 + 1) as u64) as usize);
        for x in x0..=x1 {
            for y in y0..=y1 {
                keys.push(TileKey::new(self.z, x as u32, y as u32));
            }
        }

        keys.sort_by_key(|key| {
            let dx = key.x.abs_diff(self.x) as u128;
            let dy = key.y.abs_diff(self.y) as u128;
            (key.ring_distance(self), dx * dx + dy * dy, key.y, key.x)
        });
        keys
    }

    /// All keys covering `bounds` at `zoom`, row-major
    pub fn tiles_in_bounds(bounds: &LatLngBounds, zoom: u8) -> Vec<TileKey> {
        let nw = TileKey::from_lat_lng(
            &LatLng::new(bounds.north_east.lat, bounds.south_west.lng),
            zoom,
        );
        let se = TileKey::from_lat_lng(
            &LatLng::new(bounds.south_west.lat, bounds.north_east.lng),
            zoom,
        );

        let mut keys = Vec::new();
        for y in nw.y..=se.y {
            for x in nw.x..=se.x {
                keys.push(TileKey::new(zoom, x, y));
            }
        }
        keys
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || TileError::ParseError(format!("malformed tile key '{}'", s));

        let mut parts = s.split('-');
        let (Some(z), Some(x), Some(y), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        // Reject signs and padding so that parse(s).to_string() == s.
        let canonical = |part: &str| {
            !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && (part == "0" || !part.starts_with('0'))
        };
        if !(canonical(z) && canonical(x) && canonical(y)) {
            return Err(malformed());
        }

        let z: u8 = z.parse().map_err(|_| malformed())?;
        let x: u32 = x.parse().map_err(|_| malformed())?;
        let y: u32 = y.parse().map_err(|_| malformed())?;
        if z > 31 {
            return Err(malformed());
        }

        let key = TileKey::new(z, x, y);
        if !key.is_valid() {
            return Err(TileError::ParseError(format!(
                "tile key '{}' is outside the zoom {} grid",
                s, z
            )));
        }
        Ok(key)
    }
}

/// Ground resolution at `lat` and `zoom` for 256px tiles
pub fn meters_per_pixel(lat: f64, zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE_METERS * lat.to_radians().cos() / 2_f64.powi(zoom as i32 + 8)
}

/// Ground width of a single tile at `lat` and `zoom`
pub fn meters_per_tile(lat: f64, zoom: u8) -> f64 {
    meters_per_pixel(lat, zoom) * TILE_SIZE as f64
}

/// Number of tiles needed on each side of a point to cover `meters`
pub fn corridor_radius_in_tiles(meters: f64, lat: f64, zoom: u8) -> u32 {
    let tile = meters_per_tile(LatLng::clamp_lat(lat), zoom);
    if meters <= 0.0 || tile <= 0.0 {
        return 0;
    }
    (meters / tile).ceil() as u32
}
