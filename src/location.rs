// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

const WKT_PREFIX: &str = "POINT(";

/// Length of a hex-encoded WKB point: 1 byte of byte order, 4 bytes of geometry type
/// and two 8-byte doubles, two characters per byte.
const WKB_HEX_LEN: usize = 42;

/// Length of the WKB header skipped before the coordinates, in bytes.
const WKB_HEADER_LEN: usize = 5;

/// Little-endian byte order marker followed by geometry type 1 (point).
const WKB_POINT_HEADER: [u8; WKB_HEADER_LEN] = [1, 1, 0, 0, 0];

/// Reason why a string could not be decoded into a [Location].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("empty location")]
    Empty,

    #[error("neither a WKT point nor a {WKB_HEX_LEN}-character WKB hex string")]
    UnknownFormat,

    #[error("WKT point is missing the closing parenthesis")]
    MissingClosingParen,

    #[error("WKT point must have exactly 2 coordinates, got {0}")]
    WrongTokenCount(usize),

    #[error("invalid coordinate: {0:?}")]
    InvalidNumber(String),

    #[error("coordinate is not finite: {0:?}")]
    NonFinite(String),

    #[error("invalid WKB hex string")]
    InvalidHex,
}

/// Position of a record, as received over the wire.
///
/// Locations are decoded exactly once, when a record is ingested. Unlike [decode],
/// which falls back to [GeoPoint::ORIGIN], a Location keeps "could not be decoded"
/// distinguishable from a real position at `(0, 0)`.
///
/// Locations serialize to WKT, unless a coordinate is not finite - those points are
/// written back as WKB hex, which (unlike WKT) can hold them. [Location::Unparseable]
/// serializes to `null`. Locations deserialize from any nullable string.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Location {
    /// Decoded from a `POINT(<lng> <lat>)` string.
    Wkt(GeoPoint),

    /// Decoded from a hex-encoded little-endian WKB point.
    WkbHex(GeoPoint),

    /// Missing, or in neither of the recognized formats.
    #[default]
    Unparseable,
}

impl Location {
    /// Decodes a (possibly missing) raw location. Never fails - strings which can't be
    /// decoded result in [Location::Unparseable].
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| Self::try_parse(raw).ok())
            .unwrap_or(Self::Unparseable)
    }

    /// Decodes a raw location, returning the reason if that's not possible.
    ///
    /// Strings starting with `POINT(` are treated as WKT, strings of exactly
    /// 42 characters as WKB hex. No other formats are recognized, and no
    /// surrounding whitespace is allowed.
    pub fn try_parse(raw: &str) -> Result<Self, LocationError> {
        if raw.is_empty() {
            Err(LocationError::Empty)
        } else if let Some(rest) = raw.strip_prefix(WKT_PREFIX) {
            parse_wkt(rest).map(Self::Wkt)
        } else if raw.len() == WKB_HEX_LEN {
            parse_wkb_hex(raw).map(Self::WkbHex)
        } else {
            Err(LocationError::UnknownFormat)
        }
    }

    /// Returns the decoded position, or `None` for [Location::Unparseable].
    pub fn point(&self) -> Option<GeoPoint> {
        match *self {
            Self::Wkt(p) | Self::WkbHex(p) => Some(p),
            Self::Unparseable => None,
        }
    }

    /// Returns the decoded position, falling back to [GeoPoint::ORIGIN].
    pub fn point_or_origin(&self) -> GeoPoint {
        self.point().unwrap_or(GeoPoint::ORIGIN)
    }

    pub fn is_decodable(&self) -> bool {
        !matches!(self, Self::Unparseable)
    }

    /// Returns the position encoded as WKT, or `None` for [Location::Unparseable]
    /// and for points with a non-finite coordinate.
    pub fn to_wkt(&self) -> Option<String> {
        self.point().filter(is_finite).map(encode_wkt)
    }

    /// Returns the string this location serializes to, or `None` for
    /// [Location::Unparseable]. Decoding the result gives back a decodable location
    /// at the same position.
    pub fn to_wire(&self) -> Option<String> {
        let p = self.point()?;
        if is_finite(&p) {
            Some(encode_wkt(p))
        } else {
            Some(encode_wkb_hex(p))
        }
    }
}

impl From<GeoPoint> for Location {
    fn from(p: GeoPoint) -> Self {
        Self::Wkt(p)
    }
}

impl From<Option<String>> for Location {
    fn from(raw: Option<String>) -> Self {
        Self::parse(raw.as_deref())
    }
}

impl From<Location> for Option<String> {
    fn from(l: Location) -> Self {
        l.to_wire()
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s)
    }
}

/// Decodes a raw location into a [GeoPoint]. Never fails - anything which is not
/// a WKT or WKB hex point (including a missing string) decodes to [GeoPoint::ORIGIN].
///
/// Prefer [Location::parse] wherever an undecodable location must not be confused
/// with a real position at `(0, 0)`.
pub fn decode(raw: Option<&str>) -> GeoPoint {
    Location::parse(raw).point_or_origin()
}

/// Encodes a position as a WKT `POINT(<lng> <lat>)` string. Note that the
/// longitude comes first.
pub fn encode_wkt(p: GeoPoint) -> String {
    format!("POINT({} {})", p.lng, p.lat)
}

/// Encodes a position as a hex-encoded little-endian WKB point.
fn encode_wkb_hex(p: GeoPoint) -> String {
    let mut buf = [0u8; WKB_HEX_LEN / 2];
    buf[..WKB_HEADER_LEN].copy_from_slice(&WKB_POINT_HEADER);
    buf[WKB_HEADER_LEN..WKB_HEADER_LEN + 8].copy_from_slice(&p.lng.to_le_bytes());
    buf[WKB_HEADER_LEN + 8..].copy_from_slice(&p.lat.to_le_bytes());
    hex::encode(buf)
}

fn is_finite(p: &GeoPoint) -> bool {
    p.lat.is_finite() && p.lng.is_finite()
}

/// Parses the part of a WKT point after the `POINT(` prefix.
fn parse_wkt(rest: &str) -> Result<GeoPoint, LocationError> {
    let end = rest.find(')').ok_or(LocationError::MissingClosingParen)?;
    let tokens = rest[..end].split_whitespace().collect::<Vec<_>>();

    match tokens.as_slice() {
        &[lng, lat] => Ok(GeoPoint {
            lat: parse_coordinate(lat)?,
            lng: parse_coordinate(lng)?,
        }),
        _ => Err(LocationError::WrongTokenCount(tokens.len())),
    }
}

fn parse_coordinate(token: &str) -> Result<f64, LocationError> {
    let value = token
        .parse::<f64>()
        .map_err(|_| LocationError::InvalidNumber(token.to_string()))?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(LocationError::NonFinite(token.to_string()))
    }
}

/// Parses a hex-encoded WKB point. The header is not validated, and the coordinates are
/// always read as little-endian. Non-finite coordinates are passed through as-is.
fn parse_wkb_hex(raw: &str) -> Result<GeoPoint, LocationError> {
    let mut buf = [0u8; WKB_HEX_LEN / 2];
    hex::decode_to_slice(raw, &mut buf).map_err(|_| LocationError::InvalidHex)?;

    let mut lng = [0u8; 8];
    let mut lat = [0u8; 8];
    lng.copy_from_slice(&buf[WKB_HEADER_LEN..WKB_HEADER_LEN + 8]);
    lat.copy_from_slice(&buf[WKB_HEADER_LEN + 8..]);

    Ok(GeoPoint {
        lat: f64::from_le_bytes(lat),
        lng: f64::from_le_bytes(lng),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr, $eps:expr) => {
            assert!(
                (($a - $b).abs() < $eps),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    const BUENOS_AIRES_WKB: &str = "0101000000a913d044d8304dc0304ca60a464d41c0";

    #[test]
    fn wkt() {
        let p = decode(Some("POINT(-58.3816 -34.6037)"));
        assert_eq!(p, GeoPoint::new(-34.6037, -58.3816));

        let l = Location::parse(Some("POINT(-64.1888 -31.4201)"));
        assert_eq!(l, Location::Wkt(GeoPoint::new(-31.4201, -64.1888)));
    }

    #[test]
    fn wkt_tolerates_extra_whitespace() {
        let p = decode(Some("POINT(  12.5\t-7 )"));
        assert_eq!(p, GeoPoint::new(-7.0, 12.5));
    }

    #[test]
    fn wkt_errors() {
        assert_eq!(
            Location::try_parse("POINT(1 2"),
            Err(LocationError::MissingClosingParen),
        );
        assert_eq!(
            Location::try_parse("POINT(1 2 3)"),
            Err(LocationError::WrongTokenCount(3)),
        );
        assert_eq!(
            Location::try_parse("POINT()"),
            Err(LocationError::WrongTokenCount(0)),
        );
        assert_eq!(
            Location::try_parse("POINT(abc 2)"),
            Err(LocationError::InvalidNumber("abc".to_string())),
        );
        assert_eq!(
            Location::try_parse("POINT(1 inf)"),
            Err(LocationError::NonFinite("inf".to_string())),
        );
        assert_eq!(
            Location::try_parse(" POINT(1 2)"),
            Err(LocationError::UnknownFormat),
        );
        assert_eq!(decode(Some("POINT(NaN 2)")), GeoPoint::ORIGIN);
    }

    #[test]
    fn wkb_hex() {
        let p = decode(Some(BUENOS_AIRES_WKB));
        assert_almost_eq!(p.lat, -34.6037, 1e-6);
        assert_almost_eq!(p.lng, -58.3816, 1e-6);
        assert!(matches!(
            Location::parse(Some(BUENOS_AIRES_WKB)),
            Location::WkbHex(_)
        ));
    }

    #[test]
    fn wkb_hex_is_case_insensitive() {
        let upper = BUENOS_AIRES_WKB.to_ascii_uppercase();
        assert_eq!(decode(Some(&upper)), decode(Some(BUENOS_AIRES_WKB)));
    }

    #[test]
    fn wkb_hex_built_from_doubles() {
        let mut raw = String::from("0101000000");
        raw.push_str(&hex::encode(12.25f64.to_le_bytes()));
        raw.push_str(&hex::encode((-45.5f64).to_le_bytes()));
        assert_eq!(decode(Some(&raw)), GeoPoint::new(-45.5, 12.25));
    }

    #[test]
    fn wkb_hex_errors() {
        let with_prefix = format!("0x{}", &BUENOS_AIRES_WKB[2..]);
        assert_eq!(
            Location::try_parse(&with_prefix),
            Err(LocationError::InvalidHex)
        );
        assert_eq!(
            Location::try_parse(&BUENOS_AIRES_WKB[..40]),
            Err(LocationError::UnknownFormat),
        );
        let padded = format!(" {}", BUENOS_AIRES_WKB);
        assert_eq!(decode(Some(&padded)), GeoPoint::ORIGIN);
    }

    #[test]
    fn wkb_hex_keeps_nan() {
        let p = decode(Some("0101000000000000000000f87f0d71ac8bdb7840c0"));
        assert!(p.lng.is_nan());
        assert_almost_eq!(p.lat, -32.9442, 1e-6);
    }

    #[test]
    fn fallback() {
        assert_eq!(decode(Some("not a point")), GeoPoint::ORIGIN);
        assert_eq!(decode(Some("")), GeoPoint::ORIGIN);
        assert_eq!(decode(None), GeoPoint::ORIGIN);

        assert_eq!(Location::parse(None), Location::Unparseable);
        assert_eq!(Location::try_parse(""), Err(LocationError::Empty));
    }

    #[test]
    fn unparseable_is_not_origin() {
        let origin = Location::parse(Some("POINT(0 0)"));
        let garbage = Location::parse(Some("garbage"));

        assert_eq!(origin.point(), Some(GeoPoint::ORIGIN));
        assert_eq!(garbage.point(), None);
        assert_eq!(origin.point_or_origin(), garbage.point_or_origin());
        assert!(origin.is_decodable());
        assert!(!garbage.is_decodable());
    }

    #[test]
    fn encode() {
        assert_eq!(
            encode_wkt(GeoPoint::new(-34.6037, -58.3816)),
            "POINT(-58.3816 -34.6037)"
        );
        assert_eq!(encode_wkt(GeoPoint::new(1.0, 2.0)), "POINT(2 1)");
    }

    #[test]
    fn serde_wire_format() {
        #[derive(Debug, Deserialize, Serialize)]
        struct Record {
            coordinates: Location,
        }

        let r: Record = serde_json::from_str(&format!(
            r#"{{"coordinates": "{}"}}"#,
            BUENOS_AIRES_WKB
        ))
        .unwrap();
        assert!(matches!(r.coordinates, Location::WkbHex(_)));

        let r: Record = serde_json::from_str(r#"{"coordinates": null}"#).unwrap();
        assert_eq!(r.coordinates, Location::Unparseable);
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"coordinates":null}"#
        );

        let r = Record {
            coordinates: Location::WkbHex(GeoPoint::new(1.5, -2.0)),
        };
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"coordinates":"POINT(-2 1.5)"}"#
        );
    }

    #[test]
    fn non_finite_survives_serde() {
        const NAN_WKB: &str = "0101000000000000000000f87f0d71ac8bdb7840c0";

        let before = Location::parse(Some(NAN_WKB));
        assert!(matches!(before, Location::WkbHex(_)));
        assert_eq!(before.to_wkt(), None);

        let json = serde_json::to_string(&before).unwrap();
        assert_eq!(json, format!("\"{}\"", NAN_WKB));

        let after: Location = serde_json::from_str(&json).unwrap();
        assert!(after.is_decodable());
        assert!(matches!(after, Location::WkbHex(_)));
        let p = after.point().unwrap();
        assert!(p.lng.is_nan());
        assert_eq!(p.lat, before.point().unwrap().lat);

        let inf = Location::Wkt(GeoPoint::new(f64::INFINITY, 1.0));
        let after = Location::parse(inf.to_wire().as_deref());
        assert_eq!(after, Location::WkbHex(GeoPoint::new(f64::INFINITY, 1.0)));
    }

    #[test]
    fn wkb_hex_encoding() {
        let p = GeoPoint::new(-45.5, 12.25);
        let raw = encode_wkb_hex(p);
        assert_eq!(raw.len(), WKB_HEX_LEN);
        assert!(raw.starts_with("0101000000"));
        assert_eq!(Location::parse(Some(&raw)), Location::WkbHex(p));
    }

    proptest! {
        #[test]
        fn wkt_round_trip(lat in -90.0f64..=90.0f64, lng in -180.0f64..=180.0f64) {
            let p = GeoPoint::new(lat, lng);
            let decoded = decode(Some(&encode_wkt(p)));
            prop_assert!((decoded.lat - lat).abs() < 1e-9);
            prop_assert!((decoded.lng - lng).abs() < 1e-9);
        }

        #[test]
        fn decode_never_panics(raw in ".*") {
            let _ = decode(Some(&raw));
        }
    }
}
