use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A photo record as the clustering pipeline sees it. Ingestion writes the
/// row; clustering only ever reads it and sets `event_id`, exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub owner_id: Option<String>,
    pub location: Option<GeoPoint>,
    /// Capture instant, distinct from `created_at` (ingestion time).
    pub timestamp: Option<DateTime<Utc>>,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Flat row shape of the `photos` table.
#[derive(Debug, FromRow)]
pub struct PhotoRow {
    pub id: String,
    pub owner_id: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub taken_at: Option<DateTime<Utc>>,
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Self {
        let location = match (row.longitude, row.latitude) {
            (Some(longitude), Some(latitude)) => Some(GeoPoint::new(longitude, latitude)),
            _ => None,
        };
        Self {
            id: row.id,
            owner_id: row.owner_id,
            location,
            timestamp: row.taken_at,
            event_id: row.event_id,
            created_at: row.created_at,
        }
    }
}
