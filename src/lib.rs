// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Locating marketplace stores around a user.
//!
//! Store and user records carry their position in one of two wire formats:
//! a [WKT](https://en.wikipedia.org/wiki/Well-known_text_representation_of_geometry)
//! `POINT(lng lat)` string or a hex-encoded little-endian WKB point. Those are decoded
//! once, on ingestion, into a [Location], and from there into a [GeoPoint].
//! [within_radius] then selects the records inside a user's radius of interest,
//! annotated with their [great-circle distance](earth_distance).
//!
//! # Example
//!
//! ```
//! use geomarket::{GeoPoint, Location, RadiusQuery, SortByDistance};
//!
//! let stores: Vec<Location> = vec![
//!     "POINT(-58.3816 -34.6037)".parse().unwrap(),
//!     "POINT(-64.1888 -31.4201)".parse().unwrap(),
//! ];
//!
//! let query = RadiusQuery::new(GeoPoint::new(-34.6, -58.38), 10.0);
//! let mut nearby = geomarket::within_radius(&query, &stores);
//! nearby.sort_by_distance();
//!
//! assert_eq!(nearby.len(), 1);
//! assert!(nearby[0].distance_km < 1.0);
//! ```

pub mod c;
mod distance;
mod location;
pub mod market;
mod radius;
pub mod reader;

pub use distance::{earth_distance, round_km, EARTH_RADIUS_KM};
pub use location::{decode, encode_wkt, Location, LocationError};
pub use radius::{
    nearest, within_radius, within_radius_sorted, Located, RadiusQuery, Ranked, SortByDistance,
};

/// Radius of interest, in kilometers, new users start with.
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

/// A position on Earth, in decimal degrees.
///
/// `lat` is expected to lie within `[-90, 90]` and `lng` within `[-180, 180]`,
/// but this is not enforced - see [earth_distance].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// The intersection of the equator and the prime meridian,
    /// returned by [decode] for unparseable input.
    pub const ORIGIN: Self = Self { lat: 0.0, lng: 0.0 };

    #[inline]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to another point, in kilometers.
    #[inline]
    pub fn distance_km(self, other: GeoPoint) -> f64 {
        earth_distance(self, other)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}
