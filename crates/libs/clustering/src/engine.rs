use crate::pending::{PendingClusters, PendingPhoto};
use crate::store::{EventStore, JoinOutcome, PhotoStore};
use common_services::database::DbError;
use common_types::{EventUpdatedPayload, PhotoUploadedPayload};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("photo {0} not found")]
    PhotoNotFound(String),

    #[error("photo {0} is missing location or timestamp")]
    MissingGeoData(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// What happened to one photo. `Joined` and `Created` carry the downstream
/// notification; the other outcomes change nothing and publish nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// The photo already carries an event id; duplicate delivery.
    AlreadyAssigned,
    /// Lost the membership race, or the event already listed the photo.
    AlreadyLinked,
    Joined {
        event_id: String,
        photo_ids: Vec<String>,
    },
    Created {
        event_id: String,
        photo_ids: Vec<String>,
    },
    /// Buffered, waiting for quorum. An expected steady state.
    Pending,
}

impl ClusterOutcome {
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::AlreadyAssigned => "already-assigned",
            Self::AlreadyLinked => "already-linked",
            Self::Joined { .. } => "joined",
            Self::Created { .. } => "created",
            Self::Pending => "pending-cluster",
        }
    }

    /// The `event-updated` payload this outcome warrants, if any.
    #[must_use]
    pub fn notification(&self) -> Option<EventUpdatedPayload> {
        match self {
            Self::Joined {
                event_id,
                photo_ids,
            }
            | Self::Created {
                event_id,
                photo_ids,
            } => Some(EventUpdatedPayload {
                event_id: event_id.clone(),
                photo_ids: photo_ids.clone(),
            }),
            _ => None,
        }
    }
}

/// Decides, for one photo at a time: attach to the best existing ACTIVE
/// event, accumulate toward a brand new one, or do nothing because the work
/// already happened.
pub struct ClusteringEngine<P, E> {
    photos: P,
    events: E,
    pending: PendingClusters,
}

impl<P: PhotoStore, E: EventStore> ClusteringEngine<P, E> {
    #[must_use]
    pub fn new(photos: P, events: E, pending: PendingClusters) -> Self {
        Self {
            photos,
            events,
            pending,
        }
    }

    pub async fn process(
        &mut self,
        payload: &PhotoUploadedPayload,
    ) -> Result<ClusterOutcome, EngineError> {
        let photo = self
            .photos
            .find_by_id(&payload.photo_id)
            .await?
            .ok_or_else(|| EngineError::PhotoNotFound(payload.photo_id.clone()))?;

        // Idempotence guard against duplicate delivery.
        if photo.event_id.is_some() {
            return Ok(ClusterOutcome::AlreadyAssigned);
        }

        let (location, timestamp) = match (photo.location, photo.timestamp) {
            (Some(location), Some(timestamp)) => (location, timestamp),
            _ => return Err(EngineError::MissingGeoData(photo.id)),
        };

        let mut candidates = self.events.find_nearby_active(&location, timestamp).await?;
        // Closest first; freshest breaks ties. A photo belongs to exactly one
        // event, so only the single best candidate is attempted.
        candidates.sort_by(|a, b| {
            a.distance_meters
                .partial_cmp(&b.distance_meters)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.event.last_photo_timestamp.cmp(&a.event.last_photo_timestamp))
        });

        if let Some(best) = candidates.first() {
            let outcome = self
                .events
                .join_event(&best.event, &photo.id, &location, timestamp)
                .await?;
            return Ok(match outcome {
                JoinOutcome::Joined => ClusterOutcome::Joined {
                    event_id: best.event.id.clone(),
                    photo_ids: vec![photo.id],
                },
                JoinOutcome::AlreadyLinked => ClusterOutcome::AlreadyLinked,
            });
        }

        let buffered = PendingPhoto {
            id: photo.id,
            location,
            timestamp,
        };
        let Some(members) = self.pending.accumulate(buffered) else {
            return Ok(ClusterOutcome::Pending);
        };

        match self.events.create_event(&members).await? {
            Some(event) => Ok(ClusterOutcome::Created {
                photo_ids: event.photo_ids.clone(),
                event_id: event.id,
            }),
            // The repository rejected the member list as below quorum; stay
            // pending and let the sweeper resurface these photos.
            None => Ok(ClusterOutcome::Pending),
        }
    }
}
