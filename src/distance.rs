// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::GeoPoint;

/// Radius of Earth used for all distance calculations, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculates the great-circle distance between two [GeoPoints](GeoPoint)
/// using the [haversine formula](https://en.wikipedia.org/wiki/Haversine_formula).
/// Returns the result in kilometers.
///
/// No validation is performed: out-of-range coordinates give a defined but meaningless
/// result, and `NaN` coordinates propagate into a `NaN` distance.
pub fn earth_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let sin_dlat_half = ((b.lat - a.lat).to_radians() * 0.5).sin();
    let sin_dlng_half = ((b.lng - a.lng).to_radians() * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlng_half * sin_dlng_half;

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Rounds a distance to two decimal places, which is how distances are shown to users.
///
/// Radius checks must always use the unrounded value.
pub fn round_km(distance: f64) -> f64 {
    (distance * 100.0).round() / 100.0
}
