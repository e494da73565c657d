use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate pair. Wire order is always `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// Great-circle (haversine) distance between two points, in meters.
#[must_use]
pub fn distance_meters(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Arithmetic mean of longitudes and latitudes. `None` for an empty slice.
///
/// Acceptable at city/campus scale, not valid near the poles or the
/// anti-meridian.
#[must_use]
pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let (sum_lon, sum_lat) = points.iter().fold((0.0, 0.0), |(lon, lat), p| {
        (lon + p.longitude, lat + p.latitude)
    });
    let n = points.len() as f64;
    Some(GeoPoint::new(sum_lon / n, sum_lat / n))
}

/// Standard median; the mean of the two middle values for even counts.
#[must_use]
pub fn median_timestamp(timestamps: &[DateTime<Utc>]) -> Option<DateTime<Utc>> {
    if timestamps.is_empty() {
        return None;
    }
    let mut sorted: Vec<i64> = timestamps.iter().map(DateTime::timestamp_millis).collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        DateTime::from_timestamp_millis(sorted[mid])
    } else {
        DateTime::from_timestamp_millis((sorted[mid - 1] + sorted[mid]) / 2)
    }
}

/// Folds one more point into an existing mean without revisiting the members:
/// `new = (old * old_count + point) / (old_count + 1)` per coordinate.
#[must_use]
pub fn incremental_centroid(old_center: &GeoPoint, old_count: usize, new_point: &GeoPoint) -> GeoPoint {
    let old_count = old_count as f64;
    let new_count = old_count + 1.0;
    GeoPoint::new(
        (old_center.longitude * old_count + new_point.longitude) / new_count,
        (old_center.latitude * old_count + new_point.latitude) / new_count,
    )
}
