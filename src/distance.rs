//! Great-circle helpers used for route following.
//!
//! All functions are pure. Invalid coordinates (NaN, out of range) are not
//! checked and propagate into the result.

use crate::position::GeoPoint;

/// Earth's radius in meters.
pub const EARTH_RADIUS_M: f64 = 6371000.0;

/// Distance between two points using the Haversine formula.
/// Read more here: https://en.wikipedia.org/wiki/Haversine_formula
/// Returns the distance in meters.
pub fn haversine_distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine(a.latitude, a.longitude, b.latitude, b.longitude)
}

fn haversine(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let lat_from = lat_a.to_radians();
    let lat_to = lat_b.to_radians();
    let delta_lat = (lat_b - lat_a).to_radians();
    let delta_lon = (lon_b - lon_a).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_from.cos() * lat_to.cos() * (delta_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Distance from `point` to the segment `seg_start`..`seg_end`, in meters.
///
/// The projection is done on a locally flat longitude/latitude plane and the
/// parameter is clamped to [0, 1]; only the final distance is great-circle.
/// The 30/20/10 m thresholds are tuned against this approximation.
pub fn distance_point_to_segment_meters(
    point: &GeoPoint,
    seg_start: &GeoPoint,
    seg_end: &GeoPoint,
) -> f64 {
    let a = point.longitude - seg_start.longitude;
    let b = point.latitude - seg_start.latitude;
    let c = seg_end.longitude - seg_start.longitude;
    let d = seg_end.latitude - seg_start.latitude;

    let len_sq = c * c + d * d;
    if len_sq == 0.0 {
        return haversine_distance_meters(point, seg_start);
    }

    let t = ((a * c + b * d) / len_sq).clamp(0.0, 1.0);
    let closest_lat = seg_start.latitude + t * d;
    let closest_lon = seg_start.longitude + t * c;

    haversine(point.latitude, point.longitude, closest_lat, closest_lon)
}

/// Initial compass bearing from `a` to `b`, degrees in [0, 360).
pub fn bearing_degrees(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_from = a.latitude.to_radians();
    let lat_to = b.latitude.to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let y = delta_lon.sin() * lat_to.cos();
    let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lon.cos();

    let bearing = y.atan2(x).to_degrees();

    (bearing + 360.0) % 360.0
}

/// Destination reached from `start` after `distance` meters on `heading`.
/// Returns `(latitude, longitude)` with longitude normalized to [-180, 180).
pub fn destination(start: &GeoPoint, heading: f64, distance: f64) -> (f64, f64) {
    let lat1 = start.latitude.to_radians();
    let lon1 = start.longitude.to_radians();
    let brng = heading.to_radians();
    let angular_distance = distance / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * angular_distance.cos()
        + lat1.cos() * angular_distance.sin() * brng.cos())
    .asin();

    let lon2 = lon1
        + (brng.sin() * angular_distance.sin() * lat1.cos())
            .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

    let lon2_normalized = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;

    (lat2.to_degrees(), lon2_normalized)
}
