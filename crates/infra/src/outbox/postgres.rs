use std::sync::Arc;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use bookings_events::EventEnvelope;

use super::{OutboxError, OutboxStore};

fn storage(operation: &str, err: sqlx::Error) -> OutboxError {
    OutboxError::storage(format!("{operation}: {err}"))
}

/// Outbox rows in the `outbox_events` table.
///
/// Appends run as their own statement after the aggregate write, so a crash
/// in between loses the events of that write.
#[derive(Debug, Clone)]
pub struct PostgresOutbox {
    pool: Arc<PgPool>,
}

impl PostgresOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutbox {
    #[instrument(skip(self, events), fields(count = events.len()), err)]
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<(), OutboxError> {
        let mut tx = self.pool.begin().await.map_err(|e| storage("begin", e))?;
        for event in &events {
            sqlx::query(
                r#"
                INSERT INTO outbox_events (event_id, topic, event_key, envelope, created_at)
                VALUES ($1, $2, $3, $4, clock_timestamp())
                ON CONFLICT (event_id) DO NOTHING
                "#,
            )
            .bind(event.event_id())
            .bind(event.topic())
            .bind(event.key())
            .bind(Json(event))
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("append", e))?;
        }
        tx.commit().await.map_err(|e| storage("commit", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<EventEnvelope>, OutboxError> {
        let rows = sqlx::query(
            r#"
            SELECT envelope
            FROM outbox_events
            WHERE published_at IS NULL
            ORDER BY created_at ASC, event_id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| storage("fetch_pending", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Json<EventEnvelope>, _>("envelope")
                    .map(|json| json.0)
                    .map_err(|e| storage("decode envelope", e))
            })
            .collect()
    }

    #[instrument(skip(self, event_ids), fields(count = event_ids.len()), err)]
    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), OutboxError> {
        if event_ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE outbox_events SET published_at = now() WHERE event_id = ANY($1)")
            .bind(event_ids.to_vec())
            .execute(&*self.pool)
            .await
            .map_err(|e| storage("mark_published", e))?;
        Ok(())
    }
}
