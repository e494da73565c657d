mod support;

use chrono::Duration;
use clustering::pending::bucket_key;
use clustering::store::{EventStore, PhotoStore};
use clustering::sweep::{SWEEPER_RETRY_REASON, requeue_key, requeue_payload};
use common_types::Photo;
use common_types::geo::GeoPoint;
use support::{InMemoryEventStore, InMemoryPhotoStore, active_event, photo, test_config, ts};

#[test]
fn requeue_payload_tags_the_retry_reason() {
    let p = photo("p1", GeoPoint::new(4.8952, 52.3702), ts(600));
    let payload = requeue_payload(&p);
    assert_eq!(payload.photo_id, "p1");
    assert_eq!(payload.reason.as_deref(), Some(SWEEPER_RETRY_REASON));
    assert_eq!(
        payload.location.unwrap().coordinates,
        [4.8952, 52.3702],
        "wire order is [lon, lat]"
    );
    assert_eq!(payload.timestamp, Some(ts(600)));
}

/// Requeued photos are keyed by their quantized bucket so they land on the
/// same partition as their co-located peers.
#[test]
fn requeue_key_uses_the_bucket_cell() {
    let config = test_config();
    let location = GeoPoint::new(4.8952, 52.3702);
    let p = photo("p1", location, ts(600));
    assert_eq!(
        requeue_key(&p, &config),
        bucket_key(&location, ts(600), Duration::minutes(15))
    );

    let bare = Photo {
        location: None,
        ..photo("p2", location, ts(600))
    };
    assert_eq!(requeue_key(&bare, &config), "p2", "falls back to the photo id");
}

/// The spec's sweeper scenario: a 10-minute-old unassigned photo is inside a
/// 60-minute lookback, a 90-minute-old one is not.
#[tokio::test]
async fn lookback_bounds_the_unassigned_scan() {
    let photos = InMemoryPhotoStore::default();
    let now = ts(100 * 60);
    photos.insert(photo("recent", GeoPoint::new(0.0, 0.0), now - Duration::minutes(10)));
    photos.insert(photo("ancient", GeoPoint::new(0.0, 0.0), now - Duration::minutes(90)));

    let cutoff = now - Duration::minutes(60);
    let unassigned = photos.find_unassigned(cutoff, 200).await.unwrap();
    let ids: Vec<&str> = unassigned.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["recent"]);
}

#[tokio::test]
async fn unassigned_scan_is_oldest_first_and_capped() {
    let photos = InMemoryPhotoStore::default();
    for i in 0..5 {
        photos.insert(photo(&format!("p{i}"), GeoPoint::new(0.0, 0.0), ts(i * 60)));
    }

    let unassigned = photos.find_unassigned(ts(0), 3).await.unwrap();
    let ids: Vec<&str> = unassigned.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p2"]);
}

/// Finalization only ever moves ACTIVE events past the cutoff; FINALIZED
/// stays FINALIZED and fresh ACTIVE events are untouched.
#[tokio::test]
async fn finalization_is_monotonic() {
    let events = InMemoryEventStore::new(test_config());
    events.insert(active_event("stale", GeoPoint::new(0.0, 0.0), ts(0)));
    events.insert(active_event("fresh", GeoPoint::new(0.0, 0.0), ts(3600)));
    let mut done = active_event("done", GeoPoint::new(0.0, 0.0), ts(0));
    done.status = common_types::EventStatus::Finalized;
    events.insert(done);

    let cutoff = ts(1800);
    assert_eq!(events.finalize_inactive(cutoff).await.unwrap(), 1);
    assert_eq!(
        events.get("stale").unwrap().status,
        common_types::EventStatus::Finalized
    );
    assert_eq!(
        events.get("fresh").unwrap().status,
        common_types::EventStatus::Active
    );

    // A second sweep changes nothing.
    assert_eq!(events.finalize_inactive(cutoff).await.unwrap(), 0);
}
