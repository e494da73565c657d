use clustering::photo_update::assign_event_to_photos;
use clustering::store::PgPhotoStore;
use color_eyre::Result;
use common_services::bus::{BusConsumer, BusProducer, Delivery, topics};
use common_services::settings::BusSettings;
use common_types::EventUpdatedPayload;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Consumes `event-updated` and applies the idempotent photo-side effects.
/// A failure partway through a batch leaves the offset uncommitted; the whole
/// message is replayed safely because already-stamped photos are skipped.
pub struct PhotoUpdateWorker {
    consumer: BusConsumer,
    producer: BusProducer,
    photos: PgPhotoStore,
    poll_interval: Duration,
}

impl PhotoUpdateWorker {
    pub fn new(
        consumer: BusConsumer,
        producer: BusProducer,
        photos: PgPhotoStore,
        bus: &BusSettings,
    ) -> Self {
        Self {
            consumer,
            producer,
            photos,
            poll_interval: Duration::from_millis(bus.poll_interval_ms),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut sleeping = false;
        loop {
            match self.consumer.poll().await {
                Ok(Some(delivery)) => {
                    sleeping = false;
                    if let Err(err) = self.handle_delivery(delivery).await {
                        error!("Delivery handling failed: {err}");
                        sleep(self.poll_interval).await;
                    }
                }
                Ok(None) => {
                    if !sleeping {
                        sleeping = true;
                        info!("💤 No messages, going to sleep...");
                    }
                    sleep(self.poll_interval).await;
                }
                Err(err) => {
                    error!("Bus poll failed: {err}");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn handle_delivery(&mut self, delivery: Delivery) -> Result<()> {
        let payload: EventUpdatedPayload = match serde_json::from_value(delivery.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "Invalid payload at {}/{} offset {}: {err}",
                    delivery.topic, delivery.partition, delivery.offset
                );
                let body = serde_json::json!({
                    "sourceTopic": delivery.topic,
                    "partition": delivery.partition,
                    "offset": delivery.offset,
                    "error": err.to_string(),
                    "payload": delivery.payload,
                });
                self.producer
                    .publish(topics::PHOTO_DLQ, &delivery.key, &body)
                    .await?;
                self.consumer.commit(&delivery).await?;
                return Ok(());
            }
        };

        match assign_event_to_photos(&self.photos, &payload.event_id, &payload.photo_ids).await {
            Ok(()) => {
                info!(
                    "Assigned event {} to {} photo(s)",
                    payload.event_id,
                    payload.photo_ids.len()
                );
                self.consumer.commit(&delivery).await?;
            }
            Err(err) => {
                error!(
                    "Failed assigning event {} at offset {}: {err}",
                    payload.event_id, delivery.offset
                );
            }
        }
        Ok(())
    }
}
