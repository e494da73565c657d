use clap::Parser;
use clustering::engine::ClusteringEngine;
use clustering::pending::PendingClusters;
use clustering::store::{PgEventStore, PgPhotoStore};
use color_eyre::Result;
use common_services::bus::{BusConsumer, BusProducer, topics};
use common_services::database::get_db_pool;
use common_services::settings::load_app_settings;
use common_services::utils::nice_id;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use worker::ClusteringWorker;

mod worker;

#[derive(Parser, Debug)]
#[command(version, about = "Groups uploaded photos into events", long_about = None)]
struct Args {
    /// Override the consumer group this worker joins.
    #[clap(long)]
    group: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    color_eyre::install()?;
    dotenv::dotenv().ok();
    let args = Args::parse();

    let worker_id = nice_id(8);
    info!("[Worker ID: {}] Starting.", worker_id);

    let settings = load_app_settings()?;
    info!(
        "Config -> distance {}m, time +/-{}m, min photos {}",
        settings.clustering.distance_threshold_meters,
        settings.clustering.time_window_minutes,
        settings.clustering.min_photos_for_event
    );

    let pool = get_db_pool(&settings.database).await?;

    let group = args
        .group
        .unwrap_or_else(|| settings.bus.clustering_group.clone());
    let consumer = BusConsumer::subscribe(
        pool.clone(),
        &group,
        topics::PHOTO_UPLOADED,
        settings.bus.partitions,
        settings.bus.lease_seconds,
    )
    .await?;
    let producer = BusProducer::new(pool.clone(), settings.bus.partitions);

    let engine = ClusteringEngine::new(
        PgPhotoStore::new(pool.clone()),
        PgEventStore::new(pool, settings.clustering.clone()),
        PendingClusters::new(
            settings.clustering.time_window(),
            settings.clustering.min_photos_for_event,
        ),
    );

    let mut worker = ClusteringWorker::new(consumer, producer, engine, &settings.bus);

    info!("Listening on topic {} with group {}", topics::PHOTO_UPLOADED, group);
    tokio::select! {
        result = worker.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down clustering worker");
            Ok(())
        }
    }
}
