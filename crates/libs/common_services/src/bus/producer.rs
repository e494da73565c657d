use crate::bus::partition_for_key;
use crate::database::DbError;
use serde::Serialize;
use sqlx::PgPool;

/// Publishes messages onto a topic log. `publish` returns only after the
/// broker (the database) has acknowledged the append, so a successful return
/// means the message is durably queued.
#[derive(Clone)]
pub struct BusProducer {
    pool: PgPool,
    partitions: i32,
}

impl BusProducer {
    #[must_use]
    pub const fn new(pool: PgPool, partitions: i32) -> Self {
        Self { pool, partitions }
    }

    pub async fn publish<T: Serialize + Sync>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(), DbError> {
        let payload = serde_json::to_value(value)?;
        let partition = partition_for_key(key, self.partitions);
        sqlx::query(
            "INSERT INTO bus_message (topic, partition_id, key, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(topic)
        .bind(partition)
        .bind(key)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
