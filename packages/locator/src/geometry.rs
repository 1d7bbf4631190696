//! Planar geometry helpers.
//!
//! Street and house positions are held in spherical Mercator "degree"
//! units (`x` is longitude, `y` is the Mercator ordinate expressed in
//! degrees). Angles, orientation, and segment projection are computed in
//! that plane; metre distances go back through WGS84 and `geo`'s
//! haversine metric.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use geo::line_measures::Distance;
use geo::{Closest, ClosestPoint, Coord, Euclidean, Haversine, Line, Point, Rect};
use house_locator_models::LonLat;

/// Mean earth radius used by `geo`'s haversine metric.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Metres spanned by one degree of latitude.
pub const METERS_PER_DEGREE: f64 = EARTH_RADIUS_M * PI / 180.0;

/// Default metres-to-units factor until one is measured from real data.
pub const DEFAULT_METRES_TO_UNITS: f64 = 360.0 / 40.0e6;

const MAX_LAT: f64 = 86.0;

/// Projects a WGS84 position into the Mercator plane.
#[must_use]
pub fn to_mercator(p: LonLat) -> Coord<f64> {
    let lat = p.lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    Coord {
        x: p.lon,
        y: (lat * 0.5 + FRAC_PI_4).tan().ln().to_degrees(),
    }
}

/// Inverse of [`to_mercator`].
#[must_use]
pub fn to_lon_lat(c: Coord<f64>) -> LonLat {
    let lat = 2.0f64.mul_add(c.y.to_radians().exp().atan(), -FRAC_PI_2);
    LonLat::new(c.x, lat.to_degrees())
}

/// Great-circle distance in metres between two Mercator points.
#[must_use]
pub fn distance_meters(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let a = to_lon_lat(a);
    let b = to_lon_lat(b);
    Haversine.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat))
}

/// Planar distance between two Mercator points.
#[must_use]
pub fn planar_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(Point::from(a), Point::from(b))
}

/// Squared planar distance, for comparisons.
#[must_use]
pub fn square_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    d.x.mul_add(d.x, d.y * d.y)
}

/// Direction of the vector `from -> to`, in radians.
#[must_use]
pub fn angle_to(from: Coord<f64>, to: Coord<f64>) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Signed difference `b - a` between two directions, folded into
/// `(-PI, PI]`.
#[must_use]
pub fn shortest_angle(a: f64, b: f64) -> f64 {
    let d = (b - a).rem_euclid(TAU);
    if d > PI { d - TAU } else { d }
}

/// Cross product of `(b - a) x (p - a)`: positive when `p` lies to the
/// left of the directed segment `a -> b`.
#[must_use]
pub fn orientation(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> f64 {
    let ab = b - a;
    let ap = p - a;
    ab.x.mul_add(ap.y, -(ab.y * ap.x))
}

/// Closest point to `p` on the segment `a -> b`.
///
/// Returns `None` for degenerate (zero-length) segments.
#[must_use]
pub fn project_to_segment(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> Option<Coord<f64>> {
    if a == b {
        return None;
    }
    match Line::new(a, b).closest_point(&Point::from(p)) {
        Closest::Intersection(c) | Closest::SinglePoint(c) => Some(c.into()),
        Closest::Indeterminate => None,
    }
}

/// Bounding rectangle (WGS84 degrees) of the given Mercator points, grown
/// by `offset_m` metres on every side.
#[must_use]
pub fn limit_rect(points: &[Coord<f64>], offset_m: f64) -> Option<Rect<f64>> {
    let mut min = Coord {
        x: f64::INFINITY,
        y: f64::INFINITY,
    };
    let mut max = Coord {
        x: f64::NEG_INFINITY,
        y: f64::NEG_INFINITY,
    };

    for p in points {
        let ll = to_lon_lat(*p);
        let dlat = offset_m / METERS_PER_DEGREE;
        let dlon = offset_m / (METERS_PER_DEGREE * ll.lat.to_radians().cos().max(1e-6));
        min.x = min.x.min(ll.lon - dlon);
        min.y = min.y.min(ll.lat - dlat);
        max.x = max.x.max(ll.lon + dlon);
        max.y = max.y.max(ll.lat + dlat);
    }

    if points.is_empty() {
        None
    } else {
        Some(Rect::new(min, max))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::merc_m;
    use super::*;

    #[test]
    fn mercator_round_trips() {
        let p = LonLat::new(37.6173, 55.7558);
        let back = to_lon_lat(to_mercator(p));
        assert!((back.lon - p.lon).abs() < 1e-9);
        assert!((back.lat - p.lat).abs() < 1e-9);
    }

    #[test]
    fn measures_metres_near_equator() {
        let d = distance_meters(merc_m(0.0, 0.0), merc_m(300.0, 400.0));
        assert!((d - 500.0).abs() < 0.5, "got {d}");
    }

    #[test]
    fn folds_angles_into_half_turn() {
        assert!((shortest_angle(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-12);
        assert!((shortest_angle(3.0, -3.0) - (TAU - 6.0)).abs() < 1e-12);
        assert!((shortest_angle(-3.0, 3.0) + (TAU - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn orientation_sign_follows_segment_direction() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 1.0, y: 0.0 };
        let left = Coord { x: 0.5, y: 1.0 };
        assert!(orientation(a, b, left) > 0.0);
        assert!(orientation(b, a, left) < 0.0);
    }

    #[test]
    fn projects_onto_segment_interior_and_ends() {
        let a = Coord { x: 0.0, y: 0.0 };
        let b = Coord { x: 2.0, y: 0.0 };
        let mid = project_to_segment(a, b, Coord { x: 1.0, y: 3.0 }).unwrap();
        assert!((mid.x - 1.0).abs() < 1e-12 && mid.y.abs() < 1e-12);
        let end = project_to_segment(a, b, Coord { x: 5.0, y: 1.0 }).unwrap();
        assert!((end.x - 2.0).abs() < 1e-12);
        assert!(project_to_segment(a, a, b).is_none());
    }

    #[test]
    fn limit_rect_grows_by_offset() {
        let rect = limit_rect(&[merc_m(0.0, 0.0), merc_m(100.0, 0.0)], 50.0).unwrap();
        let width_m = (rect.max().x - rect.min().x) * METERS_PER_DEGREE;
        let height_m = (rect.max().y - rect.min().y) * METERS_PER_DEGREE;
        assert!((width_m - 200.0).abs() < 0.5, "got {width_m}");
        assert!((height_m - 100.0).abs() < 0.5, "got {height_m}");
        assert!(limit_rect(&[], 10.0).is_none());
    }
}
