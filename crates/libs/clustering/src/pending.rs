use chrono::{DateTime, Duration, Utc};
use common_types::geo::GeoPoint;
use std::collections::HashMap;

/// Decimal places for the lat/lon part of a bucket key; yields cells roughly
/// comparable to the distance threshold at city scale.
const LOCATION_BUCKET_PRECISION: usize = 4;

/// The slice of a photo the pending buffer needs.
#[derive(Debug, Clone)]
pub struct PendingPhoto {
    pub id: String,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

/// Quantized location+time key. Photos sharing a key are candidates for
/// forming one new event; the same key is also used to route `photo-uploaded`
/// messages so co-located photos reach the same consumer partition.
#[must_use]
pub fn bucket_key(location: &GeoPoint, timestamp: DateTime<Utc>, window: Duration) -> String {
    let time_bucket = timestamp
        .timestamp_millis()
        .div_euclid(window.num_milliseconds().max(1));
    format!(
        "{lat:.prec$}:{lon:.prec$}:{time_bucket}",
        lat = location.latitude,
        lon = location.longitude,
        prec = LOCATION_BUCKET_PRECISION,
    )
}

/// In-memory accumulator for photos with no nearby existing event.
///
/// Best-effort and process-local: a restart loses the buckets, and the
/// sweeper's requeue eventually resurfaces the photos. Explicitly owned by
/// one worker instance rather than living in module state.
pub struct PendingClusters {
    window: Duration,
    min_photos: usize,
    buckets: HashMap<String, Vec<PendingPhoto>>,
}

impl PendingClusters {
    #[must_use]
    pub fn new(time_window: Duration, min_photos: usize) -> Self {
        Self {
            window: time_window,
            min_photos,
            buckets: HashMap::new(),
        }
    }

    /// Fold a photo into its bucket. Members falling outside the time window
    /// relative to this latest arrival are dropped; insertion is idempotent
    /// by photo id. Returns the full member list once the bucket reaches the
    /// minimum count, removing it from the buffer.
    pub fn accumulate(&mut self, photo: PendingPhoto) -> Option<Vec<PendingPhoto>> {
        let key = bucket_key(&photo.location, photo.timestamp, self.window);

        let mut members: Vec<PendingPhoto> = self
            .buckets
            .remove(&key)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| (p.timestamp - photo.timestamp).abs() <= self.window)
            .collect();

        if !members.iter().any(|p| p.id == photo.id) {
            members.push(photo);
        }

        if members.len() >= self.min_photos {
            return Some(members);
        }

        self.buckets.insert(key, members);
        None
    }

    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo(id: &str, minute: i64) -> PendingPhoto {
        PendingPhoto {
            id: id.to_string(),
            location: GeoPoint::new(4.8952, 52.3702),
            timestamp: Utc.timestamp_opt(minute * 60, 0).unwrap(),
        }
    }

    fn buffer() -> PendingClusters {
        PendingClusters::new(Duration::minutes(15), 5)
    }

    #[test]
    fn stays_pending_below_quorum() {
        let mut pending = buffer();
        for i in 0..4 {
            assert!(pending.accumulate(photo(&format!("p{i}"), i64::from(i))).is_none());
        }
        assert_eq!(pending.bucket_count(), 1);
    }

    #[test]
    fn quorum_releases_the_full_bucket() {
        let mut pending = buffer();
        for i in 0..4 {
            assert!(pending.accumulate(photo(&format!("p{i}"), i64::from(i))).is_none());
        }
        let members = pending.accumulate(photo("p4", 4)).expect("quorum reached");
        assert_eq!(members.len(), 5);
        assert_eq!(pending.bucket_count(), 0, "bucket is removed on release");
    }

    #[test]
    fn accumulate_is_idempotent_by_photo_id() {
        let mut pending = buffer();
        for _ in 0..10 {
            assert!(pending.accumulate(photo("p0", 0)).is_none());
        }
    }

    #[test]
    fn photos_in_different_time_buckets_do_not_combine() {
        let mut pending = buffer();
        assert!(pending.accumulate(photo("old", 0)).is_none());
        // 20+ minutes later these land in the next time bucket; "old" does
        // not count toward their quorum.
        for i in 0..4 {
            assert!(pending.accumulate(photo(&format!("p{i}"), 20 + i)).is_none());
        }
        assert_eq!(pending.bucket_count(), 2);
        let members = pending.accumulate(photo("p4", 24)).expect("quorum reached");
        assert_eq!(members.len(), 5);
        assert!(members.iter().all(|p| p.id != "old"));
    }

    #[test]
    fn distant_locations_use_distinct_buckets() {
        let mut pending = buffer();
        pending.accumulate(photo("a", 0));
        let far = PendingPhoto {
            id: "far".to_string(),
            location: GeoPoint::new(5.1214, 52.0907),
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
        };
        pending.accumulate(far);
        assert_eq!(pending.bucket_count(), 2);
    }
}
