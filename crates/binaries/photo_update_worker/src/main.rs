use clap::Parser;
use clustering::store::PgPhotoStore;
use color_eyre::Result;
use common_services::bus::{BusConsumer, BusProducer, topics};
use common_services::database::get_db_pool;
use common_services::settings::load_app_settings;
use common_services::utils::nice_id;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;
use worker::PhotoUpdateWorker;

mod worker;

#[derive(Parser, Debug)]
#[command(version, about = "Stamps photos with their event assignment", long_about = None)]
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
    let pool = get_db_pool(&settings.database).await?;

    let group = args
        .group
        .unwrap_or_else(|| settings.bus.photo_update_group.clone());
    let consumer = BusConsumer::subscribe(
        pool.clone(),
        &group,
        topics::EVENT_UPDATED,
        settings.bus.partitions,
        settings.bus.lease_seconds,
    )
    .await?;
    let producer = BusProducer::new(pool.clone(), settings.bus.partitions);

    let mut worker = PhotoUpdateWorker::new(
        consumer,
        producer,
        PgPhotoStore::new(pool),
        &settings.bus,
    );

    info!("Listening on topic {} with group {}", topics::EVENT_UPDATED, group);
    tokio::select! {
        result = worker.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down photo-update worker");
            Ok(())
        }
    }
}
