use crate::pending::PendingPhoto;
use crate::store::{EventStore, JoinOutcome, NearbyEvent, PhotoStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_services::database::DbError;
use common_services::settings::ClusteringSettings;
use common_services::utils::nice_id;
use common_types::geo::{GeoPoint, centroid, distance_meters, incremental_centroid, median_timestamp};
use common_types::{Event, EventRow, EventStatus, Photo, PhotoRow};
use sqlx::PgPool;
use tracing::debug;

const EVENT_ID_LENGTH: usize = 16;
const EVENT_NAME: &str = "SnapMap Event";

/// Meters per degree of latitude, for the bounding-box prefilter.
const METERS_PER_DEGREE: f64 = 111_320.0;

const PHOTO_COLUMNS: &str = "id, owner_id, longitude, latitude, taken_at, event_id, created_at";
const EVENT_COLUMNS: &str = "id, name, status, center_longitude, center_latitude, radius_meters, \
     photo_count, photo_ids, start_time, end_time, last_photo_timestamp, event_timestamp, created_at";

pub struct PgPhotoStore {
    pool: PgPool,
}

impl PgPhotoStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoStore for PgPhotoStore {
    async fn find_by_id(&self, photo_id: &str) -> Result<Option<Photo>, DbError> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = $1"
        ))
        .bind(photo_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Photo::from))
    }

    async fn assign_event(&self, photo_id: &str, event_id: &str) -> Result<bool, DbError> {
        let result =
            sqlx::query("UPDATE photos SET event_id = $2 WHERE id = $1 AND event_id IS NULL")
                .bind(photo_id)
                .bind(event_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_unassigned(
        &self,
        created_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            r"
            SELECT {PHOTO_COLUMNS}
            FROM photos
            WHERE event_id IS NULL AND created_at >= $1
            ORDER BY created_at
            LIMIT $2
            "
        ))
        .bind(created_after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Photo::from).collect())
    }
}

pub struct PgEventStore {
    pool: PgPool,
    config: ClusteringSettings,
}

impl PgEventStore {
    #[must_use]
    pub const fn new(pool: PgPool, config: ClusteringSettings) -> Self {
        Self { pool, config }
    }

    async fn find_by_id(&self, event_id: &str) -> Result<Option<Event>, DbError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::from))
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn find_nearby_active(
        &self,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<NearbyEvent>, DbError> {
        let window = self.config.time_window();
        let threshold = self.config.distance_threshold_meters;

        // Slightly padded bounding box; the exact haversine filter below is
        // what decides membership.
        let delta_lat = threshold / METERS_PER_DEGREE * 1.05;
        let delta_lon =
            threshold / (METERS_PER_DEGREE * location.latitude.to_radians().cos().abs().max(1e-6))
                * 1.05;

        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE status = 'active'
              AND last_photo_timestamp BETWEEN $1 AND $2
              AND center_latitude BETWEEN $3 AND $4
              AND center_longitude BETWEEN $5 AND $6
            "
        ))
        .bind(timestamp - window)
        .bind(timestamp + window)
        .bind(location.latitude - delta_lat)
        .bind(location.latitude + delta_lat)
        .bind(location.longitude - delta_lon)
        .bind(location.longitude + delta_lon)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(Event::from)
            .map(|event| {
                let distance = distance_meters(location, &event.location_center);
                NearbyEvent {
                    event,
                    distance_meters: distance,
                }
            })
            .filter(|nearby| nearby.distance_meters <= threshold)
            .collect())
    }

    async fn create_event(&self, members: &[PendingPhoto]) -> Result<Option<Event>, DbError> {
        if members.len() < self.config.min_photos_for_event {
            return Ok(None);
        }

        let points: Vec<GeoPoint> = members.iter().map(|p| p.location).collect();
        let timestamps: Vec<DateTime<Utc>> = members.iter().map(|p| p.timestamp).collect();

        let Some(center) = centroid(&points) else {
            return Ok(None);
        };
        let (Some(&start_time), Some(&end_time)) =
            (timestamps.iter().min(), timestamps.iter().max())
        else {
            return Ok(None);
        };
        let event_timestamp = median_timestamp(&timestamps).unwrap_or(end_time);

        let event = Event {
            id: nice_id(EVENT_ID_LENGTH),
            name: EVENT_NAME.to_string(),
            status: EventStatus::Active,
            location_center: center,
            radius_meters: self.config.distance_threshold_meters,
            photo_count: members.len() as i32,
            photo_ids: members.iter().map(|p| p.id.clone()).collect(),
            start_time,
            end_time,
            last_photo_timestamp: end_time,
            event_timestamp,
            created_at: Utc::now(),
        };

        sqlx::query(
            r"
            INSERT INTO events (id, name, status, center_longitude, center_latitude,
                                radius_meters, photo_count, photo_ids, start_time, end_time,
                                last_photo_timestamp, event_timestamp, created_at)
            VALUES ($1, $2, 'active', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(&event.id)
        .bind(&event.name)
        .bind(event.location_center.longitude)
        .bind(event.location_center.latitude)
        .bind(event.radius_meters)
        .bind(event.photo_count)
        .bind(&event.photo_ids)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.last_photo_timestamp)
        .bind(event.event_timestamp)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(Some(event))
    }

    async fn join_event(
        &self,
        event: &Event,
        photo_id: &str,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<JoinOutcome, DbError> {
        // Re-read: the candidate may be stale by the time we get here.
        let Some(current) = self.find_by_id(&event.id).await? else {
            debug!("Event {} vanished before join; treating as linked elsewhere", event.id);
            return Ok(JoinOutcome::AlreadyLinked);
        };
        if current.status != EventStatus::Active {
            return Ok(JoinOutcome::AlreadyLinked);
        }
        if current.photo_ids.iter().any(|id| id == photo_id) {
            return Ok(JoinOutcome::AlreadyLinked);
        }

        let new_center = incremental_centroid(
            &current.location_center,
            current.photo_count.max(0) as usize,
            location,
        );
        let new_last = current.last_photo_timestamp.max(timestamp);

        // The precondition re-checks status and membership at write time, so
        // a concurrent joiner of the same photo loses cleanly.
        let result = sqlx::query(
            r"
            UPDATE events
            SET center_longitude = $2,
                center_latitude = $3,
                radius_meters = $4,
                end_time = $5,
                last_photo_timestamp = $5,
                photo_count = photo_count + 1,
                photo_ids = array_append(photo_ids, $6)
            WHERE id = $1
              AND status = 'active'
              AND NOT (photo_ids @> ARRAY[$6]::text[])
            ",
        )
        .bind(&current.id)
        .bind(new_center.longitude)
        .bind(new_center.latitude)
        .bind(self.config.distance_threshold_meters)
        .bind(new_last)
        .bind(photo_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(JoinOutcome::AlreadyLinked);
        }
        Ok(JoinOutcome::Joined)
    }

    async fn finalize_inactive(&self, inactive_since: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query(
            r"
            UPDATE events
            SET status = 'finalized'
            WHERE status = 'active' AND last_photo_timestamp < $1
            ",
        )
        .bind(inactive_since)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
