// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::cmp::Ordering;

use crate::{earth_distance, round_km, GeoPoint, Location};

/// Anything positioned by a [Location], e.g. a store or a user's home.
pub trait Located {
    fn location(&self) -> &Location;
}

impl Located for Location {
    fn location(&self) -> &Location {
        self
    }
}

impl<T: Located + ?Sized> Located for &T {
    fn location(&self) -> &Location {
        (**self).location()
    }
}

/// Parameters of [within_radius].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
    /// Reference position, usually the user's home.
    pub origin: GeoPoint,

    /// Maximum distance from `origin`, in kilometers, inclusive.
    /// A negative (or `NaN`) radius matches nothing.
    pub radius_km: f64,

    /// Return every candidate, ignoring `radius_km`. Used for the administrator view.
    pub bypass_filter: bool,
}

impl RadiusQuery {
    pub fn new(origin: GeoPoint, radius_km: f64) -> Self {
        Self {
            origin,
            radius_km,
            bypass_filter: false,
        }
    }

    /// Returns a copy of this query with `bypass_filter` set.
    pub fn with_bypass(self, bypass_filter: bool) -> Self {
        Self {
            bypass_filter,
            ..self
        }
    }

    /// Checks whether a candidate at the given distance should be returned.
    /// `NaN` distances are never within radius.
    pub fn admits(&self, distance_km: f64) -> bool {
        self.bypass_filter || distance_km <= self.radius_km
    }
}

/// A candidate annotated with its distance from [RadiusQuery::origin].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked<T> {
    pub entity: T,
    pub distance_km: f64,
}

impl<T> Ranked<T> {
    /// Distance rounded to two decimal places, for display.
    pub fn rounded_distance_km(&self) -> f64 {
        round_km(self.distance_km)
    }
}

/// Selects all candidates within [RadiusQuery::radius_km] of [RadiusQuery::origin],
/// preserving their input order.
///
/// Candidates with an [unparseable](Location::Unparseable) location are never within radius.
/// If [RadiusQuery::bypass_filter] is set, all candidates are returned - those without
/// a known position have a `NaN` distance.
pub fn within_radius<T, I>(query: &RadiusQuery, candidates: I) -> Vec<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    candidates
        .into_iter()
        .filter_map(|entity| {
            let distance_km = match entity.location().point() {
                Some(p) => earth_distance(query.origin, p),
                None if query.bypass_filter => f64::NAN,
                None => return None,
            };

            if query.admits(distance_km) {
                Some(Ranked {
                    entity,
                    distance_km,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Same as [within_radius], but with results ordered by ascending distance.
pub fn within_radius_sorted<T, I>(query: &RadiusQuery, candidates: I) -> Vec<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    let mut result = within_radius(query, candidates);
    result.sort_by_distance();
    result
}

/// Finds the candidate closest to `origin`. Candidates without a known
/// position are skipped. On ties, the earlier candidate wins.
pub fn nearest<T, I>(origin: GeoPoint, candidates: I) -> Option<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    candidates
        .into_iter()
        .filter_map(|entity| {
            let distance_km = earth_distance(origin, entity.location().point()?);
            if distance_km.is_nan() {
                None
            } else {
                Some(Ranked {
                    entity,
                    distance_km,
                })
            }
        })
        .min_by(|a, b| compare_distances(a.distance_km, b.distance_km))
}

pub trait SortByDistance {
    /// Stable sort by ascending distance, with `NaN` distances last.
    fn sort_by_distance(&mut self);
}

impl<T> SortByDistance for [Ranked<T>] {
    fn sort_by_distance(&mut self) {
        self.sort_by(|a, b| compare_distances(a.distance_km, b.distance_km));
    }
}

fn compare_distances(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EARTH_RADIUS_KM;

    fn wkt(lat: f64, lng: f64) -> Location {
        Location::Wkt(GeoPoint::new(lat, lng))
    }

    /// Point on the equator, `km` kilometers east of the prime meridian.
    fn east_of_origin(km: f64) -> Location {
        wkt(0.0, (km / EARTH_RADIUS_KM).to_degrees())
    }

    #[test]
    fn empty_candidates() {
        let q = RadiusQuery::new(GeoPoint::ORIGIN, 10.0);
        assert!(within_radius(&q, Vec::<Location>::new()).is_empty());
        assert!(within_radius(&q.with_bypass(true), Vec::<Location>::new()).is_empty());
        assert!(nearest(GeoPoint::ORIGIN, Vec::<Location>::new()).is_none());
    }

    #[test]
    fn boundary_is_inclusive() {
        let edge = east_of_origin(111.0);
        let radius_km = earth_distance(GeoPoint::ORIGIN, edge.point_or_origin());
        assert!((radius_km - 111.0).abs() < 1e-9);

        let beyond = east_of_origin(radius_km + 0.001);
        let candidates = [edge, beyond];

        let q = RadiusQuery::new(GeoPoint::ORIGIN, radius_km);
        let result = within_radius(&q, &candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(*result[0].entity, edge);
        assert_eq!(result[0].distance_km, radius_km);
    }

    #[test]
    fn zero_radius() {
        let candidates = [wkt(0.0, 0.0), wkt(0.0, 1e-9), wkt(0.0, 0.0)];
        let q = RadiusQuery::new(GeoPoint::ORIGIN, 0.0);
        assert_eq!(within_radius(&q, &candidates).len(), 2);
    }

    #[test]
    fn negative_radius_matches_nothing() {
        let candidates = [wkt(0.0, 0.0), wkt(10.0, 10.0)];
        let q = RadiusQuery::new(GeoPoint::ORIGIN, -1.0);
        assert!(within_radius(&q, &candidates).is_empty());

        let q = RadiusQuery::new(GeoPoint::ORIGIN, f64::NAN);
        assert!(within_radius(&q, &candidates).is_empty());
    }

    #[test]
    fn unparseable_is_excluded() {
        let candidates = [Location::Unparseable, wkt(0.0, 0.0)];
        let q = RadiusQuery::new(GeoPoint::ORIGIN, 1000.0);
        let result = within_radius(&q, &candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(*result[0].entity, wkt(0.0, 0.0));
    }

    #[test]
    fn nan_distance_is_excluded() {
        let candidates = [Location::WkbHex(GeoPoint::new(-32.9442, f64::NAN))];
        for radius_km in [0.0, 1.0, 20_000.0, f64::INFINITY] {
            let q = RadiusQuery::new(GeoPoint::ORIGIN, radius_km);
            assert!(within_radius(&q, &candidates).is_empty());
        }
    }

    #[test]
    fn bypass_returns_everything() {
        let far = wkt(-34.6037, -58.3816);
        let candidates = [far, Location::Unparseable, wkt(0.0, 0.0)];
        let q = RadiusQuery::new(GeoPoint::ORIGIN, 1.0).with_bypass(true);

        let result = within_radius_sorted(&q, &candidates);
        assert_eq!(result.len(), 3);

        assert_eq!(*result[0].entity, wkt(0.0, 0.0));
        assert_eq!(result[0].distance_km, 0.0);

        assert_eq!(*result[1].entity, far);
        assert_eq!(
            result[1].distance_km,
            earth_distance(GeoPoint::ORIGIN, far.point_or_origin())
        );

        assert_eq!(*result[2].entity, Location::Unparseable);
        assert!(result[2].distance_km.is_nan());
    }

    #[test]
    fn sorting_is_stable() {
        let mut ranked = vec![
            Ranked {
                entity: 'a',
                distance_km: 2.0,
            },
            Ranked {
                entity: 'b',
                distance_km: f64::NAN,
            },
            Ranked {
                entity: 'c',
                distance_km: 1.0,
            },
            Ranked {
                entity: 'd',
                distance_km: 2.0,
            },
            Ranked {
                entity: 'e',
                distance_km: 1.0,
            },
        ];
        ranked.sort_by_distance();

        let order = ranked.iter().map(|r| r.entity).collect::<String>();
        assert_eq!(order, "ceadb");
    }

    #[test]
    fn nearest_candidate() {
        let candidates = [
            Location::Unparseable,
            wkt(0.0, 2.0),
            wkt(0.0, -1.0),
            wkt(1.0, 0.0),
        ];
        let n = nearest(GeoPoint::ORIGIN, &candidates).unwrap();
        assert_eq!(*n.entity, wkt(0.0, -1.0));
        assert_eq!(n.rounded_distance_km(), 111.19);

        assert!(nearest(GeoPoint::ORIGIN, [Location::Unparseable]).is_none());
    }
}
