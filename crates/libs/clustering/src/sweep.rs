use crate::pending::bucket_key;
use crate::store::{EventStore, PhotoStore};
use chrono::{Duration, Utc};
use common_services::bus::{BusProducer, topics};
use common_services::settings::{ClusteringSettings, SweeperSettings};
use common_types::{Photo, PhotoUploadedPayload};
use tracing::{error, info};

pub const SWEEPER_RETRY_REASON: &str = "event-sweeper-retry";

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    pub requeued: usize,
    pub finalized: u64,
}

/// Routing key for a requeued photo: the quantized location+time bucket when
/// known, so co-located photos land on the same partition and the same
/// pending buffer; otherwise the photo id.
#[must_use]
pub fn requeue_key(photo: &Photo, clustering: &ClusteringSettings) -> String {
    match (photo.location, photo.timestamp) {
        (Some(location), Some(timestamp)) => {
            bucket_key(&location, timestamp, clustering.time_window())
        }
        _ => photo.id.clone(),
    }
}

#[must_use]
pub fn requeue_payload(photo: &Photo) -> PhotoUploadedPayload {
    PhotoUploadedPayload {
        photo_id: photo.id.clone(),
        timestamp: photo.timestamp,
        location: photo.location.map(Into::into),
        reason: Some(SWEEPER_RETRY_REASON.to_string()),
    }
}

/// One reconciliation pass: requeue photos that never got an event, then
/// finalize events that have gone stale. The steps are independent and each
/// is idempotent, so a partial failure is simply retried on the next tick.
pub async fn run_sweep(
    photos: &impl PhotoStore,
    events: &impl EventStore,
    producer: &BusProducer,
    sweeper: &SweeperSettings,
    clustering: &ClusteringSettings,
) -> SweepSummary {
    let mut summary = SweepSummary::default();

    let lookback_cutoff = Utc::now() - Duration::minutes(sweeper.lookback_minutes);
    match photos.find_unassigned(lookback_cutoff, sweeper.batch_size).await {
        Ok(unassigned) => {
            if unassigned.is_empty() {
                info!("No unassigned photos found");
            }
            for photo in &unassigned {
                let payload = requeue_payload(photo);
                match producer
                    .publish(topics::PHOTO_UPLOADED, &requeue_key(photo, clustering), &payload)
                    .await
                {
                    Ok(()) => summary.requeued += 1,
                    Err(err) => {
                        error!("Requeue of photo {} failed: {err}", photo.id);
                        break;
                    }
                }
            }
            if summary.requeued > 0 {
                info!("Requeued {} photo(s) for clustering", summary.requeued);
            }
        }
        Err(err) => error!("Unassigned photo scan failed: {err}"),
    }

    let inactivity_cutoff = Utc::now() - Duration::minutes(sweeper.event_inactivity_minutes);
    match events.finalize_inactive(inactivity_cutoff).await {
        Ok(finalized) => {
            summary.finalized = finalized;
            if finalized > 0 {
                info!("Finalized {finalized} inactive event(s)");
            }
        }
        Err(err) => error!("Finalizing inactive events failed: {err}"),
    }

    summary
}
