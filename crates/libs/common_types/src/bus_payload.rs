use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GeoJSON-style point as carried on the wire: `{"coordinates": [lon, lat]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPayload {
    pub coordinates: [f64; 2],
}

impl From<GeoPoint> for LocationPayload {
    fn from(point: GeoPoint) -> Self {
        Self {
            coordinates: [point.longitude, point.latitude],
        }
    }
}

impl LocationPayload {
    #[must_use]
    pub const fn as_geo_point(&self) -> GeoPoint {
        GeoPoint::new(self.coordinates[0], self.coordinates[1])
    }
}

/// Value published on the `photo-uploaded` topic, keyed per message.
///
/// `timestamp` and `location` are informational; the clustering engine
/// always loads the photo record itself. `reason` tags sweeper retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoUploadedPayload {
    pub photo_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Value published on the `event-updated` topic, keyed by event id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdatedPayload {
    pub event_id: String,
    pub photo_ids: Vec<String>,
}
