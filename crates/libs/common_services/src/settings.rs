use chrono::Duration;
use serde::Deserialize;

/// Overall application configuration. Sourced from the environment with the
/// `APP` prefix and `__` separator (e.g. `APP__DATABASE__URL`), read once at
/// startup and passed explicitly to the components that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub database: DatabaseSettings,
    pub clustering: ClusteringSettings,
    pub sweeper: SweeperSettings,
    pub bus: BusSettings,
}

/// Database connection configuration. The URL has no default; a missing
/// `APP__DATABASE__URL` is a fatal startup error.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

/// The three tunables of the distance/time/quorum policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusteringSettings {
    /// Max proximity for joining an event, and the radius of new events.
    pub distance_threshold_meters: f64,
    /// Symmetric window for the nearby-event query and pending buckets.
    pub time_window_minutes: i64,
    /// Quorum to create a new event from pending photos.
    pub min_photos_for_event: usize,
}

impl ClusteringSettings {
    #[must_use]
    pub fn time_window(&self) -> Duration {
        Duration::minutes(self.time_window_minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperSettings {
    /// How far back to scan for unassigned photos.
    pub lookback_minutes: i64,
    /// Max photos requeued per sweep.
    pub batch_size: i64,
    /// ACTIVE events idle longer than this are finalized.
    pub event_inactivity_minutes: i64,
    pub interval_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusSettings {
    /// Partitions per topic. Per-key ordering holds within a partition.
    pub partitions: i32,
    pub poll_interval_ms: u64,
    /// Partition leases are reclaimable after this long without renewal.
    pub lease_seconds: i64,
    pub clustering_group: String,
    pub photo_update_group: String,
}

/// Load the app settings from the environment.
pub fn load_app_settings() -> color_eyre::Result<AppSettings> {
    let builder = config::Config::builder()
        .set_default("database.max_connections", 5)?
        .set_default("database.acquire_timeout_seconds", 10)?
        .set_default("clustering.distance_threshold_meters", 75.0)?
        .set_default("clustering.time_window_minutes", 15)?
        .set_default("clustering.min_photos_for_event", 5)?
        .set_default("sweeper.lookback_minutes", 60)?
        .set_default("sweeper.batch_size", 200)?
        .set_default("sweeper.event_inactivity_minutes", 60)?
        .set_default("sweeper.interval_minutes", 5)?
        .set_default("bus.partitions", 4)?
        .set_default("bus.poll_interval_ms", 1000)?
        .set_default("bus.lease_seconds", 30)?
        .set_default("bus.clustering_group", "snapmap-event-clustering")?
        .set_default("bus.photo_update_group", "snapmap-photo-update-worker")?
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );
    Ok(builder.build()?.try_deserialize::<AppSettings>()?)
}
