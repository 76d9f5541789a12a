//! Geodesy helpers for route tracking.
//!
//! Distances use the haversine formula on a spherical Earth. Segment
//! projection works in a local equirectangular plane centered on the segment
//! start, which is accurate to well under a meter for the segment lengths
//! found in turn-by-turn route geometry.

mod types;

pub use types::{
    Coordinate, GeoError, SegmentProjection, EARTH_RADIUS_M, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON,
};

/// Great-circle distance between two coordinates in meters.
#[inline]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees (0-360, 0 = north, 90 = east).
pub fn bearing(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let bearing_deg = y.atan2(x).to_degrees();

    if bearing_deg < 0.0 {
        bearing_deg + 360.0
    } else {
        bearing_deg
    }
}

/// Total length of a coordinate sequence in meters.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Project `point` onto the segment `start`→`end`.
///
/// The parametric position is clamped to [0, 1] so the result always lies on
/// the segment. A zero-length segment returns `start`.
pub fn project_onto_segment(
    point: &Coordinate,
    start: &Coordinate,
    end: &Coordinate,
) -> SegmentProjection {
    let (px, py) = to_local_meters(start, point);
    let (ex, ey) = to_local_meters(start, end);

    let len_sq = ex * ex + ey * ey;
    if len_sq == 0.0 {
        return SegmentProjection {
            point: *start,
            t: 0.0,
            distance_m: haversine_distance(point, start),
        };
    }

    let t = ((px * ex + py * ey) / len_sq).clamp(0.0, 1.0);
    let projected = interpolate(start, end, t);

    SegmentProjection {
        point: projected,
        t,
        distance_m: haversine_distance(point, &projected),
    }
}

/// Linear interpolation between two coordinates (0 = `a`, 1 = `b`).
pub fn interpolate(a: &Coordinate, b: &Coordinate, t: f64) -> Coordinate {
    Coordinate::new_unchecked(
        a.latitude + (b.latitude - a.latitude) * t,
        a.longitude + (b.longitude - a.longitude) * t,
    )
}

/// Offset a coordinate by a distance along a bearing (flat-earth, short range).
///
/// Used to synthesize nearby positions; accurate to centimeters below a few
/// kilometers.
pub fn offset(origin: &Coordinate, bearing_deg: f64, distance_m: f64) -> Coordinate {
    let bearing_rad = bearing_deg.to_radians();
    let dnorth = distance_m * bearing_rad.cos();
    let deast = distance_m * bearing_rad.sin();

    let meters_per_deg = EARTH_RADIUS_M.to_radians();
    let dlat = dnorth / meters_per_deg;
    let dlon = deast / (meters_per_deg * origin.latitude.to_radians().cos());

    Coordinate::new_unchecked(origin.latitude + dlat, origin.longitude + dlon)
}

/// Equirectangular offset of `point` from `origin` in meters (east, north).
fn to_local_meters(origin: &Coordinate, point: &Coordinate) -> (f64, f64) {
    let meters_per_deg = EARTH_RADIUS_M.to_radians();
    let x = (point.longitude - origin.longitude)
        * meters_per_deg
        * origin.latitude.to_radians().cos();
    let y = (point.latitude - origin.latitude) * meters_per_deg;
    (x, y)
}
