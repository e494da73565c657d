use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Accepts new photos.
    Active,
    /// Terminal; accepts none.
    Finalized,
}

/// A persisted cluster representing a real-world happening: a centroid
/// location, a time interval and a set of member photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub status: EventStatus,
    /// Running centroid of all member photo locations.
    pub location_center: GeoPoint,
    /// The clustering distance threshold at the time of the last update.
    pub radius_meters: f64,
    pub photo_count: i32,
    /// Member photo ids in join order; membership is a set.
    pub photo_ids: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Max member photo timestamp; drives staleness and finalization.
    pub last_photo_timestamp: DateTime<Utc>,
    /// Median member timestamp at creation, fixed thereafter.
    pub event_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Flat row shape of the `events` table.
#[derive(Debug, FromRow)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub status: EventStatus,
    pub center_longitude: f64,
    pub center_latitude: f64,
    pub radius_meters: f64,
    pub photo_count: i32,
    pub photo_ids: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub last_photo_timestamp: DateTime<Utc>,
    pub event_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            status: row.status,
            location_center: GeoPoint::new(row.center_longitude, row.center_latitude),
            radius_meters: row.radius_meters,
            photo_count: row.photo_count,
            photo_ids: row.photo_ids,
            start_time: row.start_time,
            end_time: row.end_time,
            last_photo_timestamp: row.last_photo_timestamp,
            event_timestamp: row.event_timestamp,
            created_at: row.created_at,
        }
    }
}
