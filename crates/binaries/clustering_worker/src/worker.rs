use clustering::engine::ClusteringEngine;
use clustering::store::{PgEventStore, PgPhotoStore};
use color_eyre::Result;
use common_services::bus::{BusConsumer, BusProducer, Delivery, topics};
use common_services::settings::BusSettings;
use common_types::PhotoUploadedPayload;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Consumes `photo-uploaded` and drives the clustering engine, committing an
/// offset only after the message's effects are durable.
pub struct ClusteringWorker {
    consumer: BusConsumer,
    producer: BusProducer,
    engine: ClusteringEngine<PgPhotoStore, PgEventStore>,
    poll_interval: Duration,
}

impl ClusteringWorker {
    pub fn new(
        consumer: BusConsumer,
        producer: BusProducer,
        engine: ClusteringEngine<PgPhotoStore, PgEventStore>,
        bus: &BusSettings,
    ) -> Self {
        Self {
            consumer,
            producer,
            engine,
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
                        // Bus-side failure (publish or commit); the offset
                        // stays put and redelivery retries the message.
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
        let payload: PhotoUploadedPayload = match serde_json::from_value(delivery.payload.clone())
        {
            Ok(payload) => payload,
            Err(err) => {
                // A malformed message must never block the partition: route
                // it to the dead-letter topic and advance.
                warn!(
                    "Invalid payload at {}/{} offset {}: {err}",
                    delivery.topic, delivery.partition, delivery.offset
                );
                self.dead_letter(&delivery, &err.to_string()).await?;
                self.consumer.commit(&delivery).await?;
                return Ok(());
            }
        };

        match self.engine.process(&payload).await {
            Ok(outcome) => {
                // Publish before committing, so no offset is acknowledged
                // for effects that were lost.
                if let Some(notification) = outcome.notification() {
                    self.producer
                        .publish(topics::EVENT_UPDATED, &notification.event_id, &notification)
                        .await?;
                }
                info!("photo {} -> {}", payload.photo_id, outcome.action());
                self.consumer.commit(&delivery).await?;
            }
            Err(err) => {
                // Store unavailable, photo missing: leave uncommitted for
                // redelivery after restart or lease handover.
                error!(
                    "Failed clustering photo {} at offset {}: {err}",
                    payload.photo_id, delivery.offset
                );
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        let body = serde_json::json!({
            "sourceTopic": delivery.topic,
            "partition": delivery.partition,
            "offset": delivery.offset,
            "error": reason,
            "payload": delivery.payload,
        });
        self.producer
            .publish(topics::PHOTO_DLQ, &delivery.key, &body)
            .await?;
        Ok(())
    }
}
