// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use super::*;

use std::ffi::{c_char, CStr};
use std::ptr::copy_nonoverlapping;
use std::slice;

/// Reads a NUL-terminated location string. NULL and non-UTF-8 strings are unparseable.
unsafe fn location_from_c(raw: *const c_char) -> Location {
    if raw.is_null() {
        Location::Unparseable
    } else {
        Location::parse(CStr::from_ptr(raw).to_str().ok())
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn geomarket_decode_location(raw: *const c_char) -> GeoPoint {
    location_from_c(raw).point_or_origin()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn geomarket_location_is_decodable(raw: *const c_char) -> bool {
    location_from_c(raw).is_decodable()
}

/// Writes the WKT representation of `point` into `buf`, always NUL-terminating it
/// and truncating if necessary. Returns the length of the full WKT string,
/// without the terminator - just like `snprintf`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geomarket_encode_wkt(
    point: GeoPoint,
    buf: *mut c_char,
    buf_len: usize,
) -> usize {
    let wkt = encode_wkt(point);
    if !buf.is_null() && buf_len > 0 {
        let n = wkt.len().min(buf_len - 1);
        copy_nonoverlapping(wkt.as_ptr() as *const c_char, buf, n);
        *buf.add(n) = 0;
    }
    wkt.len()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn geomarket_earth_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    earth_distance(a, b)
}

#[derive(Clone, Copy)]
#[repr(C)]
pub struct CRadiusQuery {
    pub origin: GeoPoint,
    pub radius_km: f64,
    pub bypass_filter: bool,
}

impl From<&CRadiusQuery> for RadiusQuery {
    fn from(value: &CRadiusQuery) -> Self {
        RadiusQuery::new(value.origin, value.radius_km).with_bypass(value.bypass_filter)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct CRanked {
    pub index: usize,
    pub distance_km: f64,
}

/// Location tagged with its position in the caller's array.
struct Indexed(usize, Location);

impl Located for Indexed {
    fn location(&self) -> &Location {
        &self.1
    }
}

/// Runs [within_radius_sorted] over `locations_len` location strings.
///
/// `out` must have room for `locations_len` entries. Returns the number of entries
/// written; each one refers back to `locations` by index. NULL arguments result in
/// no matches.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn geomarket_within_radius(
    c_query: *const CRadiusQuery,
    locations: *const *const c_char,
    locations_len: usize,
    out: *mut CRanked,
) -> usize {
    let Some(c_query) = c_query.as_ref() else {
        return 0;
    };
    if locations.is_null() || out.is_null() {
        return 0;
    }

    let candidates = slice::from_raw_parts(locations, locations_len)
        .iter()
        .enumerate()
        .map(|(i, &raw)| Indexed(i, location_from_c(raw)));
    let ranked = within_radius_sorted(&RadiusQuery::from(c_query), candidates);

    let out = slice::from_raw_parts_mut(out, locations_len);
    for (slot, r) in out.iter_mut().zip(&ranked) {
        *slot = CRanked {
            index: r.entity.0,
            distance_km: r.distance_km,
        };
    }

    ranked.len()
}
