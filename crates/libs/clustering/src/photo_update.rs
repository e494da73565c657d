use crate::store::PhotoStore;
use common_services::database::DbError;
use tracing::debug;

/// Apply "photo joined event" side effects: stamp each listed photo with the
/// event id, skipping photos that already carry one. Safe to replay — the
/// conditional write only fires while `event_id` is unset.
pub async fn assign_event_to_photos(
    photos: &impl PhotoStore,
    event_id: &str,
    photo_ids: &[String],
) -> Result<(), DbError> {
    for photo_id in photo_ids {
        let already_assigned = photos
            .find_by_id(photo_id)
            .await?
            .is_some_and(|photo| photo.event_id.is_some());
        if already_assigned {
            debug!("Photo {photo_id} already has an event; skipping");
            continue;
        }
        photos.assign_event(photo_id, event_id).await?;
    }
    Ok(())
}
