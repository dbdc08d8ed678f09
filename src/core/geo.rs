//! Spherical distance helpers.

use super::record::GeoPoint;

/// Mean Earth radius in meters used for all distance thresholds.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two points on a sphere of
/// radius [`EARTH_RADIUS_M`].
#[inline]
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * a.sqrt().asin()
}

impl GeoPoint {
    /// Haversine distance to another point in meters.
    #[inline]
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        haversine_m(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}
