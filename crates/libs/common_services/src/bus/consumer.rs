use crate::database::DbError;
use crate::utils::nice_id;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::debug;

/// One message handed to a consumer. The offset is only advanced durably by
/// an explicit [`BusConsumer::commit`]; dropping a delivery without
/// committing leaves it to be redelivered after a restart or lease expiry.
#[derive(Debug)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, FromRow)]
struct ClaimedPartition {
    partition_id: i32,
    committed_offset: i64,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: i64,
    key: String,
    payload: serde_json::Value,
}

/// Reads one topic on behalf of a consumer group.
///
/// Partitions are held through leases on the offset rows (the same
/// owner/heartbeat scheme the job tables use), so within a group exactly one
/// live consumer reads a partition and per-key order is preserved. The
/// in-memory read position advances on delivery; the committed offset only on
/// `commit`.
pub struct BusConsumer {
    pool: PgPool,
    group: String,
    topic: String,
    consumer_id: String,
    lease_seconds: i64,
    positions: HashMap<i32, i64>,
    next_partition: usize,
}

impl BusConsumer {
    /// Join `group` on `topic`, making sure the group's offset rows exist.
    pub async fn subscribe(
        pool: PgPool,
        group: &str,
        topic: &str,
        partitions: i32,
        lease_seconds: i64,
    ) -> Result<Self, DbError> {
        sqlx::query(
            r"
            INSERT INTO bus_offset (consumer_group, topic, partition_id)
            SELECT $1, $2, generate_series(0, $3 - 1)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(group)
        .bind(topic)
        .bind(partitions)
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            group: group.to_string(),
            topic: topic.to_string(),
            consumer_id: nice_id(8),
            lease_seconds,
            positions: HashMap::new(),
            next_partition: 0,
        })
    }

    /// Deliver at most one message, round-robining over the partitions this
    /// consumer currently holds. `Ok(None)` means nothing is ready.
    pub async fn poll(&mut self) -> Result<Option<Delivery>, DbError> {
        let owned = self.claim_partitions().await?;
        if owned.is_empty() {
            return Ok(None);
        }

        // A partition that moved to another consumer and came back must
        // restart from its committed offset, not a stale local position.
        self.positions
            .retain(|partition, _| owned.contains_key(partition));

        let mut partitions: Vec<i32> = owned.keys().copied().collect();
        partitions.sort_unstable();

        for _ in 0..partitions.len() {
            self.next_partition = (self.next_partition + 1) % partitions.len();
            let partition = partitions[self.next_partition];
            let position = *self
                .positions
                .entry(partition)
                .or_insert_with(|| owned[&partition]);

            let row = sqlx::query_as::<_, MessageRow>(
                r"
                SELECT id, key, payload
                FROM bus_message
                WHERE topic = $1 AND partition_id = $2 AND id > $3
                ORDER BY id
                LIMIT 1
                ",
            )
            .bind(&self.topic)
            .bind(partition)
            .bind(position)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = row {
                self.positions.insert(partition, row.id);
                return Ok(Some(Delivery {
                    topic: self.topic.clone(),
                    partition,
                    offset: row.id,
                    key: row.key,
                    payload: row.payload,
                }));
            }
        }

        Ok(None)
    }

    /// Durably advance the group's read cursor past `delivery`.
    pub async fn commit(&self, delivery: &Delivery) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE bus_offset
            SET committed_offset = $4
            WHERE consumer_group = $1 AND topic = $2 AND partition_id = $3
            ",
        )
        .bind(&self.group)
        .bind(&self.topic)
        .bind(delivery.partition)
        .bind(delivery.offset)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Claim unowned or expired partitions and renew our own leases, all in
    /// one conditional update. Returns partition → committed offset.
    async fn claim_partitions(&self) -> Result<HashMap<i32, i64>, DbError> {
        let claimed = sqlx::query_as::<_, ClaimedPartition>(
            r"
            UPDATE bus_offset
            SET owner = $3, lease_expires = now() + make_interval(secs => $4)
            WHERE consumer_group = $1 AND topic = $2
              AND (owner = $3 OR owner IS NULL OR lease_expires < now())
            RETURNING partition_id, committed_offset
            ",
        )
        .bind(&self.group)
        .bind(&self.topic)
        .bind(&self.consumer_id)
        .bind(self.lease_seconds as f64)
        .fetch_all(&self.pool)
        .await?;

        if claimed.len() > self.positions.len() {
            debug!(
                "Consumer {} holds {} partition(s) of {}",
                self.consumer_id,
                claimed.len(),
                self.topic
            );
        }

        Ok(claimed
            .into_iter()
            .map(|c| (c.partition_id, c.committed_offset))
            .collect())
    }
}
