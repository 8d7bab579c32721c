//! In-memory stores
//!
//! Used by tests and local runs without Postgres. Each transaction sits behind
//! its own mutex so updates are serialized per key only.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::{
    Transition, TransactionStore, WebhookEvent, WebhookEventLog,
};
use crate::payments::types::{Transaction, TransactionKind};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type Record = Arc<Mutex<Transaction>>;

/// A thread-safe in-memory store for charges and withdrawals.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    records: Arc<RwLock<HashMap<Uuid, Record>>>,
    external_ids: Arc<RwLock<HashMap<(TransactionKind, String), Uuid>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, id: Uuid) -> Option<Record> {
        self.records.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<Transaction, DatabaseError> {
        let mut records = self.records.write().await;
        let mut external_ids = self.external_ids.write().await;

        if records.contains_key(&transaction.id) {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
                column: "id".into(),
                value: transaction.id.to_string(),
            }));
        }
        if let Some(external_id) = &transaction.external_id {
            let key = (transaction.kind(), external_id.clone());
            if external_ids.contains_key(&key) {
                return Err(DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
                    column: "external_id".into(),
                    value: external_id.clone(),
                }));
            }
            external_ids.insert(key, transaction.id);
        }

        records.insert(transaction.id, Arc::new(Mutex::new(transaction.clone())));
        Ok(transaction.clone())
    }

    async fn find_by_id(
        &self,
        kind: TransactionKind,
        id: Uuid,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let Some(record) = self.record(id).await else {
            return Ok(None);
        };
        let transaction = record.lock().await.clone();
        Ok(Some(transaction).filter(|tx| tx.kind() == kind))
    }

    async fn find_by_external_id(
        &self,
        kind: TransactionKind,
        external_id: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        let id = self
            .external_ids
            .read()
            .await
            .get(&(kind, external_id.to_string()))
            .copied();
        match id {
            Some(id) => self.find_by_id(kind, id).await,
            None => Ok(None),
        }
    }

    async fn list_by_owner(
        &self,
        kind: TransactionKind,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let records: Vec<Record> = self.records.read().await.values().cloned().collect();

        let mut owned = Vec::new();
        for record in records {
            let tx = record.lock().await;
            if tx.owner_id == owner_id && tx.kind() == kind {
                owned.push(tx.clone());
            }
        }
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_locked(
        &self,
        kind: TransactionKind,
        id: Uuid,
        transition: Transition,
    ) -> Result<(Transaction, Transaction), DatabaseError> {
        let record = self
            .record(id)
            .await
            .ok_or_else(|| DatabaseError::not_found(kind.as_str(), id))?;

        let mut guard = record.lock().await;
        if guard.kind() != kind {
            return Err(DatabaseError::not_found(kind.as_str(), id));
        }

        let before = guard.clone();
        let after = transition(&before);

        if before.external_id.is_none() {
            if let Some(external_id) = &after.external_id {
                self.external_ids
                    .write()
                    .await
                    .insert((kind, external_id.clone()), id);
            }
        }

        *guard = after.clone();
        Ok((before, after))
    }
}

/// In-memory webhook delivery log
#[derive(Default, Clone)]
pub struct InMemoryWebhookEventLog {
    events: Arc<RwLock<HashMap<Uuid, WebhookEvent>>>,
}

impl InMemoryWebhookEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<WebhookEvent> {
        self.events.read().await.get(&id).cloned()
    }

    async fn modify<F>(&self, id: Uuid, f: F) -> Result<(), DatabaseError>
    where
        F: FnOnce(&mut WebhookEvent) + Send,
    {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found("WebhookEvent", id))?;
        f(event);
        Ok(())
    }
}

#[async_trait]
impl WebhookEventLog for InMemoryWebhookEventLog {
    async fn log_event(
        &self,
        id: Uuid,
        kind: TransactionKind,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<WebhookEvent, DatabaseError> {
        let event = WebhookEvent {
            id,
            event_type: kind.as_str().to_string(),
            source: source.to_string(),
            payload: payload.clone(),
            processed: false,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            processed_at: None,
            dead_lettered_at: None,
        };
        self.events.write().await.insert(id, event.clone());
        Ok(event)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<(), DatabaseError> {
        self.modify(id, |event| {
            event.processed = true;
            event.processed_at = Some(Utc::now());
        })
        .await
    }

    async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let error = error.to_string();
        self.modify(id, move |event| {
            event.attempts += 1;
            event.last_error = Some(error);
        })
        .await
    }

    async fn mark_dead_lettered(&self, id: Uuid, error: &str) -> Result<(), DatabaseError> {
        let error = error.to_string();
        self.modify(id, move |event| {
            event.last_error = Some(error);
            event.dead_lettered_at = Some(Utc::now());
        })
        .await
    }

    async fn get_failed_events(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let mut failed: Vec<WebhookEvent> = self
            .events
            .read()
            .await
            .values()
            .filter(|event| event.dead_lettered_at.is_some())
            .cloned()
            .collect();
        failed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        failed.truncate(limit.max(0) as usize);
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{TransactionDetails, TransactionStatus};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn charge(owner_id: Uuid, external_id: &str) -> Transaction {
        Transaction::pending(
            owner_id,
            Uuid::new_v4(),
            external_id.to_string(),
            dec!(10.00),
            TransactionDetails::empty(TransactionKind::Charge),
            json!({}),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_by_external_id() {
        let store = InMemoryTransactionStore::new();
        let tx = charge(Uuid::new_v4(), "PX1");
        store.insert(&tx).await.unwrap();

        let found = store
            .find_by_external_id(TransactionKind::Charge, "PX1")
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some(tx.id));

        let wrong_kind = store
            .find_by_external_id(TransactionKind::Withdrawal, "PX1")
            .await
            .unwrap();
        assert!(wrong_kind.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_external_id_is_rejected() {
        let store = InMemoryTransactionStore::new();
        store.insert(&charge(Uuid::new_v4(), "PX1")).await.unwrap();
        let err = store.insert(&charge(Uuid::new_v4(), "PX1")).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_update_locked_returns_before_and_after() {
        let store = InMemoryTransactionStore::new();
        let tx = charge(Uuid::new_v4(), "PX1");
        store.insert(&tx).await.unwrap();

        let (before, after) = store
            .update_locked(
                TransactionKind::Charge,
                tx.id,
                Box::new(|current| {
                    let mut next = current.clone();
                    next.status = TransactionStatus::Paid;
                    next
                }),
            )
            .await
            .unwrap();

        assert_eq!(before.status, TransactionStatus::Pending);
        assert_eq!(after.status, TransactionStatus::Paid);
        let stored = store.find_by_id(TransactionKind::Charge, tx.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Paid);
    }

    #[tokio::test]
    async fn test_update_missing_transaction() {
        let store = InMemoryTransactionStore::new();
        let err = store
            .update_locked(TransactionKind::Charge, Uuid::new_v4(), Box::new(|t| t.clone()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_owner_paginates() {
        let store = InMemoryTransactionStore::new();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            store.insert(&charge(owner, &format!("PX{}", i))).await.unwrap();
        }
        store.insert(&charge(Uuid::new_v4(), "OTHER")).await.unwrap();

        let page = store
            .list_by_owner(TransactionKind::Charge, owner, 3, 0)
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        let rest = store
            .list_by_owner(TransactionKind::Charge, owner, 3, 3)
            .await
            .unwrap();
        assert_eq!(rest.len(), 2);
    }

    #[tokio::test]
    async fn test_webhook_log_dead_letter() {
        let log = InMemoryWebhookEventLog::new();
        let id = Uuid::new_v4();
        log.log_event(id, TransactionKind::Charge, "SubadqA", &json!({"x": 1}))
            .await
            .unwrap();
        log.record_failure(id, "boom").await.unwrap();
        log.mark_dead_lettered(id, "boom").await.unwrap();

        let failed = log.get_failed_events(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 1);
        assert_eq!(failed[0].last_error.as_deref(), Some("boom"));
    }
}
