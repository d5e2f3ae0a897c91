//! Local tangent-plane conversions and bearings
//!
//! Baselines in this system span tens to hundreds of metres, so a flat-earth
//! projection around a reference point is accurate to well below the range
//! measurement noise.

use crate::core::constants::METERS_PER_DEGREE;
use crate::core::types::GeoPoint;
use nalgebra::Vector2;

/// Project a geodetic point into metres east/north of `origin`
pub fn to_local(point: GeoPoint, origin: GeoPoint) -> Vector2<f64> {
    let east =
        (point.longitude - origin.longitude) * METERS_PER_DEGREE * origin.latitude.to_radians().cos();
    let north = (point.latitude - origin.latitude) * METERS_PER_DEGREE;
    Vector2::new(east, north)
}

/// Inverse of [`to_local`]
pub fn to_geodetic(local: Vector2<f64>, origin: GeoPoint) -> GeoPoint {
    let latitude = origin.latitude + local.y / METERS_PER_DEGREE;
    let longitude = origin.longitude
        + local.x / (METERS_PER_DEGREE * origin.latitude.to_radians().cos());
    GeoPoint::new(latitude, longitude)
}

/// Bearing from `from` to `to` in degrees, normalized to [0, 360)
pub fn bearing_deg(from: GeoPoint, to: GeoPoint) -> f64 {
    let local = to_local(to, from);
    let bearing = local.x.atan2(local.y).to_degrees();
    if bearing < 0.0 {
        bearing + 360.0
    } else {
        bearing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint {
        latitude: 48.5,
        longitude: 44.5,
    };

    #[test]
    fn test_local_round_trip() {
        let point = GeoPoint::new(48.5012, 44.5034);
        let local = to_local(point, ORIGIN);
        let back = to_geodetic(local, ORIGIN);
        assert!((back.latitude - point.latitude).abs() < 1e-9);
        assert!((back.longitude - point.longitude).abs() < 1e-9);
    }

    #[test]
    fn test_cardinal_bearings() {
        let north = to_geodetic(Vector2::new(0.0, 100.0), ORIGIN);
        let east = to_geodetic(Vector2::new(100.0, 0.0), ORIGIN);
        let south = to_geodetic(Vector2::new(0.0, -100.0), ORIGIN);
        let west = to_geodetic(Vector2::new(-100.0, 0.0), ORIGIN);
        assert!((bearing_deg(ORIGIN, north) - 0.0).abs() < 1e-6);
        assert!((bearing_deg(ORIGIN, east) - 90.0).abs() < 1e-6);
        assert!((bearing_deg(ORIGIN, south) - 180.0).abs() < 1e-6);
        assert!((bearing_deg(ORIGIN, west) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_local_distances() {
        let point = to_geodetic(Vector2::new(30.0, 40.0), ORIGIN);
        let local = to_local(point, ORIGIN);
        assert!((local.norm() - 50.0).abs() < 1e-6);
    }
}
