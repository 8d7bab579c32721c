use crate::database::error::DatabaseError;
use crate::payments::types::{Transaction, TransactionKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-modify-write step run while the transaction is locked
pub type Transition = Box<dyn FnOnce(&Transaction) -> Transaction + Send>;

/// Storage for charges and withdrawals
///
/// Implementations must serialize `update_locked` per transaction id; updates
/// to different transactions may run in parallel.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new transaction
    async fn insert(&self, transaction: &Transaction) -> Result<Transaction, DatabaseError>;

    /// Find a transaction by platform id
    async fn find_by_id(
        &self,
        kind: TransactionKind,
        id: Uuid,
    ) -> Result<Option<Transaction>, DatabaseError>;

    /// Find a transaction by the provider's identifier
    async fn find_by_external_id(
        &self,
        kind: TransactionKind,
        external_id: &str,
    ) -> Result<Option<Transaction>, DatabaseError>;

    /// Owner's transactions, newest first
    async fn list_by_owner(
        &self,
        kind: TransactionKind,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, DatabaseError>;

    /// Apply `transition` under the per-transaction lock
    ///
    /// Returns the record before and after the update.
    async fn update_locked(
        &self,
        kind: TransactionKind,
        id: Uuid,
        transition: Transition,
    ) -> Result<(Transaction, Transaction), DatabaseError>;
}

/// Durable record of an inbound webhook and its processing attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub dead_lettered_at: Option<DateTime<Utc>>,
}

/// Webhook delivery log, queried by operators after retries run out
#[async_trait]
pub trait WebhookEventLog: Send + Sync {
    /// Log a newly received webhook
    async fn log_event(
        &self,
        id: Uuid,
        kind: TransactionKind,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError>;

    /// Mark webhook event as processed
    async fn mark_processed(&self, id: Uuid) -> Result<(), DatabaseError>;

    /// Record one failed processing attempt
    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    /// Terminal failure after the retry bound
    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DatabaseError>;

    /// Dead-lettered events, newest first
    async fn get_failed_events(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError>;
}
