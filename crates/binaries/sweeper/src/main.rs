use clap::Parser;
use clustering::store::{PgEventStore, PgPhotoStore};
use clustering::sweep::run_sweep;
use color_eyre::Result;
use common_services::bus::BusProducer;
use common_services::database::get_db_pool;
use common_services::settings::{AppSettings, load_app_settings};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(version, about = "Requeues orphaned photos and finalizes stale events", long_about = None)]
struct Args {
    /// Run a single sweep and exit instead of staying on the schedule.
    #[clap(long, default_value_t = false, action)]
    once: bool,
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

    let settings = load_app_settings()?;
    let pool = get_db_pool(&settings.database).await?;

    let photos = PgPhotoStore::new(pool.clone());
    let events = PgEventStore::new(pool.clone(), settings.clustering.clone());
    let producer = BusProducer::new(pool, settings.bus.partitions);

    if args.once {
        let summary = run_sweep(
            &photos,
            &events,
            &producer,
            &settings.sweeper,
            &settings.clustering,
        )
        .await;
        info!(
            "Sweep completed: {} requeued, {} finalized",
            summary.requeued, summary.finalized
        );
        return Ok(());
    }

    info!(
        "Scheduling sweep every {} minute(s)",
        settings.sweeper.interval_minutes
    );
    tokio::select! {
        result = run_schedule(&settings, &photos, &events, &producer) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down sweeper");
            Ok(())
        }
    }
}

async fn run_schedule(
    settings: &AppSettings,
    photos: &PgPhotoStore,
    events: &PgEventStore,
    producer: &BusProducer,
) -> Result<()> {
    let mut interval =
        tokio::time::interval(Duration::from_secs(settings.sweeper.interval_minutes * 60));

    loop {
        // The first tick of `interval` happens immediately.
        interval.tick().await;

        info!("Sweep started");
        let summary = run_sweep(
            photos,
            events,
            producer,
            &settings.sweeper,
            &settings.clustering,
        )
        .await;
        info!(
            "Sweep completed: {} requeued, {} finalized",
            summary.requeued, summary.finalized
        );
    }
}
