#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clustering::pending::PendingPhoto;
use clustering::store::{EventStore, JoinOutcome, NearbyEvent, PhotoStore};
use common_services::database::DbError;
use common_services::settings::ClusteringSettings;
use common_types::geo::{GeoPoint, centroid, distance_meters, incremental_centroid, median_timestamp};
use common_types::{Event, EventStatus, Photo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn test_config() -> ClusteringSettings {
    ClusteringSettings {
        distance_threshold_meters: 75.0,
        time_window_minutes: 15,
        min_photos_for_event: 5,
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn photo(id: &str, location: GeoPoint, timestamp: DateTime<Utc>) -> Photo {
    Photo {
        id: id.to_string(),
        owner_id: Some("owner".to_string()),
        location: Some(location),
        timestamp: Some(timestamp),
        event_id: None,
        created_at: timestamp,
    }
}

/// Photo store backed by a shared map, so tests keep a handle while the
/// engine owns a clone.
#[derive(Clone, Default)]
pub struct InMemoryPhotoStore {
    inner: Arc<Mutex<HashMap<String, Photo>>>,
}

impl InMemoryPhotoStore {
    pub fn insert(&self, photo: Photo) {
        self.inner.lock().unwrap().insert(photo.id.clone(), photo);
    }

    pub fn get(&self, id: &str) -> Option<Photo> {
        self.inner.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl PhotoStore for InMemoryPhotoStore {
    async fn find_by_id(&self, photo_id: &str) -> Result<Option<Photo>, DbError> {
        Ok(self.inner.lock().unwrap().get(photo_id).cloned())
    }

    async fn assign_event(&self, photo_id: &str, event_id: &str) -> Result<bool, DbError> {
        let mut photos = self.inner.lock().unwrap();
        match photos.get_mut(photo_id) {
            Some(photo) if photo.event_id.is_none() => {
                photo.event_id = Some(event_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_unassigned(
        &self,
        created_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError> {
        let mut unassigned: Vec<Photo> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.event_id.is_none() && p.created_at >= created_after)
            .cloned()
            .collect();
        unassigned.sort_by_key(|p| p.created_at);
        unassigned.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(unassigned)
    }
}

/// Event store mirroring the conditional-update semantics of the Postgres
/// implementation, including the inclusive distance/time boundaries.
#[derive(Clone)]
pub struct InMemoryEventStore {
    inner: Arc<Mutex<HashMap<String, Event>>>,
    next_id: Arc<AtomicUsize>,
    config: ClusteringSettings,
}

impl InMemoryEventStore {
    pub fn new(config: ClusteringSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicUsize::new(1)),
            config,
        }
    }

    pub fn insert(&self, event: Event) {
        self.inner.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn get(&self, id: &str) -> Option<Event> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Event> {
        self.inner.lock().unwrap().values().cloned().collect()
    }
}

pub fn active_event(id: &str, center: GeoPoint, last_photo: DateTime<Utc>) -> Event {
    Event {
        id: id.to_string(),
        name: "SnapMap Event".to_string(),
        status: EventStatus::Active,
        location_center: center,
        radius_meters: 75.0,
        photo_count: 5,
        photo_ids: (0..5).map(|i| format!("{id}-member-{i}")).collect(),
        start_time: last_photo,
        end_time: last_photo,
        last_photo_timestamp: last_photo,
        event_timestamp: last_photo,
        created_at: last_photo,
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn find_nearby_active(
        &self,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<NearbyEvent>, DbError> {
        let window = self.config.time_window();
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|event| event.status == EventStatus::Active)
            .filter(|event| (event.last_photo_timestamp - timestamp).abs() <= window)
            .map(|event| NearbyEvent {
                distance_meters: distance_meters(location, &event.location_center),
                event: event.clone(),
            })
            .filter(|nearby| nearby.distance_meters <= self.config.distance_threshold_meters)
            .collect())
    }

    async fn create_event(
        &self,
        members: &[PendingPhoto],
    ) -> Result<Option<Event>, DbError> {
        if members.len() < self.config.min_photos_for_event {
            return Ok(None);
        }
        let points: Vec<GeoPoint> = members.iter().map(|p| p.location).collect();
        let timestamps: Vec<DateTime<Utc>> = members.iter().map(|p| p.timestamp).collect();
        let start_time = timestamps.iter().min().copied().unwrap();
        let end_time = timestamps.iter().max().copied().unwrap();

        let event = Event {
            id: format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            name: "SnapMap Event".to_string(),
            status: EventStatus::Active,
            location_center: centroid(&points).unwrap(),
            radius_meters: self.config.distance_threshold_meters,
            photo_count: i32::try_from(members.len()).unwrap(),
            photo_ids: members.iter().map(|p| p.id.clone()).collect(),
            start_time,
            end_time,
            last_photo_timestamp: end_time,
            event_timestamp: median_timestamp(&timestamps).unwrap(),
            created_at: end_time,
        };
        self.insert(event.clone());
        Ok(Some(event))
    }

    async fn join_event(
        &self,
        event: &Event,
        photo_id: &str,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<JoinOutcome, DbError> {
        let mut events = self.inner.lock().unwrap();
        let Some(current) = events.get_mut(&event.id) else {
            return Ok(JoinOutcome::AlreadyLinked);
        };
        if current.status != EventStatus::Active
            || current.photo_ids.iter().any(|id| id == photo_id)
        {
            return Ok(JoinOutcome::AlreadyLinked);
        }

        current.location_center = incremental_centroid(
            &current.location_center,
            usize::try_from(current.photo_count).unwrap_or(0),
            location,
        );
        current.radius_meters = self.config.distance_threshold_meters;
        current.last_photo_timestamp = current.last_photo_timestamp.max(timestamp);
        current.end_time = current.last_photo_timestamp;
        current.photo_count += 1;
        current.photo_ids.push(photo_id.to_string());
        Ok(JoinOutcome::Joined)
    }

    async fn finalize_inactive(&self, inactive_since: DateTime<Utc>) -> Result<u64, DbError> {
        let mut finalized = 0;
        for event in self.inner.lock().unwrap().values_mut() {
            if event.status == EventStatus::Active && event.last_photo_timestamp < inactive_since {
                event.status = EventStatus::Finalized;
                finalized += 1;
            }
        }
        Ok(finalized)
    }
}
