// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Geohash encoding.
//!
//! A geohash interleaves longitude and latitude bisection bits (longitude
//! first) and packs them five at a time into a base-32 alphabet:
//!
//! ```text
//! (47.6062, -122.3321) --9 chars--> "c23nb62qp"
//! ```
//!
//! See: <https://en.wikipedia.org/wiki/Geohash>

use thiserror::Error;

/// Geohash base-32 alphabet (no `a`, `i`, `l`, `o`).
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported hash. Twelve characters is already sub-centimetre.
pub const MAX_PRECISION: usize = 12;

/// Geohash errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeohashError {
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("invalid precision {0} (expected 1..=12)")]
    InvalidPrecision(usize),

    #[error("invalid geohash: {0:?}")]
    InvalidHash(String),
}

/// Bounding box of a geohash cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Check whether a coordinate falls inside this cell (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

/// Encode a coordinate as a geohash of `precision` characters.
///
/// Latitude must lie in `[-90, 90]` and longitude in `[-180, 180]`.
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String, GeohashError> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(GeohashError::InvalidPrecision(precision));
    }
    if !lat.is_finite()
        || !lon.is_finite()
        || !(-90.0..=90.0).contains(&lat)
        || !(-180.0..=180.0).contains(&lon)
    {
        return Err(GeohashError::InvalidCoordinate { lat, lon });
    }

    let (mut lat_min, mut lat_max) = (-90.0_f64, 90.0_f64);
    let (mut lon_min, mut lon_max) = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bits = 0;
    let mut idx = 0usize;

    while hash.len() < precision {
        if even_bit {
            let mid = (lon_min + lon_max) / 2.0;
            if lon >= mid {
                idx = idx * 2 + 1;
                lon_min = mid;
            } else {
                idx *= 2;
                lon_max = mid;
            }
        } else {
            let mid = (lat_min + lat_max) / 2.0;
            if lat >= mid {
                idx = idx * 2 + 1;
                lat_min = mid;
            } else {
                idx *= 2;
                lat_max = mid;
            }
        }
        even_bit = !even_bit;

        bits += 1;
        if bits == 5 {
            hash.push(BASE32[idx] as char);
            bits = 0;
            idx = 0;
        }
    }

    Ok(hash)
}

/// Bounding box of the cell named by `hash`.
pub fn bounds(hash: &str) -> Result<Bounds, GeohashError> {
    if hash.is_empty() {
        return Err(GeohashError::InvalidHash(hash.to_string()));
    }

    let (mut lat_min, mut lat_max) = (-90.0_f64, 90.0_f64);
    let (mut lon_min, mut lon_max) = (-180.0_f64, 180.0_f64);
    let mut even_bit = true;

    for c in hash.chars() {
        let idx = BASE32
            .iter()
            .position(|&b| b as char == c.to_ascii_lowercase())
            .ok_or_else(|| GeohashError::InvalidHash(hash.to_string()))?;

        for n in (0..5).rev() {
            let bit = (idx >> n) & 1;
            if even_bit {
                let mid = (lon_min + lon_max) / 2.0;
                if bit == 1 {
                    lon_min = mid;
                } else {
                    lon_max = mid;
                }
            } else {
                let mid = (lat_min + lat_max) / 2.0;
                if bit == 1 {
                    lat_min = mid;
                } else {
                    lat_max = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    Ok(Bounds {
        min_lat: lat_min,
        min_lon: lon_min,
        max_lat: lat_max,
        max_lon: lon_max,
    })
}

/// Decode a geohash to the centre of its cell as `(lat, lon)`.
pub fn decode(hash: &str) -> Result<(f64, f64), GeohashError> {
    let b = bounds(hash)?;
    Ok(((b.min_lat + b.max_lat) / 2.0, (b.min_lon + b.max_lon) / 2.0))
}
