mod pg;

pub use pg::*;

use crate::pending::PendingPhoto;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_services::database::DbError;
use common_types::geo::GeoPoint;
use common_types::{Event, Photo};

/// An ACTIVE event candidate, annotated with the exact great-circle distance
/// to the photo under consideration.
#[derive(Debug, Clone)]
pub struct NearbyEvent {
    pub event: Event,
    pub distance_meters: f64,
}

/// Result of attempting to add a photo to an event. A rejected conditional
/// update (lost race, concurrent finalization) is `AlreadyLinked`, never an
/// error; the other writer's result is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyLinked,
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn find_by_id(&self, photo_id: &str) -> Result<Option<Photo>, DbError>;

    /// Conditionally stamp `event_id`, only if it is still unset. Returns
    /// whether a row was changed.
    async fn assign_event(&self, photo_id: &str, event_id: &str) -> Result<bool, DbError>;

    /// Photos without an event, created on or after `created_after`, oldest
    /// first, capped at `limit`.
    async fn find_unassigned(
        &self,
        created_after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Photo>, DbError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// ACTIVE events within the distance threshold of `location` whose
    /// `last_photo_timestamp` is within the time window of `timestamp`, in
    /// both directions. Both boundaries are inclusive.
    async fn find_nearby_active(
        &self,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<NearbyEvent>, DbError>;

    /// Persist a new ACTIVE event from at least quorum-many photos; `None`
    /// when given fewer.
    async fn create_event(&self, members: &[PendingPhoto]) -> Result<Option<Event>, DbError>;

    /// Add one photo to an event through a conditional update that only
    /// succeeds while the event is ACTIVE and the photo is still absent.
    async fn join_event(
        &self,
        event: &Event,
        photo_id: &str,
        location: &GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<JoinOutcome, DbError>;

    /// Bulk-transition ACTIVE events idle since before `inactive_since` to
    /// FINALIZED. Returns how many changed.
    async fn finalize_inactive(&self, inactive_since: DateTime<Utc>) -> Result<u64, DbError>;
}
