use crate::database::error::DatabaseError;
use crate::database::repository::{WebhookEvent, WebhookEventLog};
use crate::payments::types::TransactionKind;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const EVENT_COLUMNS: &str = "id, event_type, source, payload, processed, attempts, last_error, \
     created_at, processed_at, dead_lettered_at";

/// Webhook Repository for webhook event storage and tracking
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Events neither processed nor dead-lettered, oldest first
    ///
    /// Used at startup to requeue work interrupted by a restart.
    pub async fn get_pending_events(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM webhook_events
             WHERE processed = false AND dead_lettered_at IS NULL
             ORDER BY created_at ASC LIMIT $1",
            EVENT_COLUMNS
        );
        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl WebhookEventLog for WebhookRepository {
    async fn log_event(
        &self,
        id: Uuid,
        kind: TransactionKind,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        // A requeued event keeps its id and attempt history
        let sql = format!(
            "INSERT INTO webhook_events (id, event_type, source, payload, processed, attempts, created_at)
             VALUES ($1, $2, $3, $4, false, 0, NOW())
             ON CONFLICT (id) DO UPDATE SET payload = EXCLUDED.payload
             RETURNING {}",
            EVENT_COLUMNS
        );
        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(id)
            .bind(kind.as_str())
            .bind(source)
            .bind(payload)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE webhook_events SET processed = true, processed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("WebhookEvent", id));
        }
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_events
             SET attempts = attempts + 1, last_error = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_events
             SET dead_lettered_at = NOW(), last_error = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn get_failed_events(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM webhook_events
             WHERE dead_lettered_at IS NOT NULL
             ORDER BY created_at DESC LIMIT $1",
            EVENT_COLUMNS
        );
        sqlx::query_as::<_, WebhookEvent>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
