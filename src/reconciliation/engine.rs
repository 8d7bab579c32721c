//! Transaction State Engine
//!
//! Locates the transaction a normalized event refers to and applies it under
//! the store's per-transaction lock.

use crate::database::error::DatabaseError;
use crate::database::repository::TransactionStore;
use crate::error::{payload_excerpt, AppError, AppErrorKind, AppResult};
use crate::payments::types::{NormalizedEvent, Transaction, TransactionStatus};
use crate::reconciliation::transition::{accepts, apply_event, TerminalPolicy};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of applying an event
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Event recorded against the transaction; `previous` is the status before
    Updated {
        previous: TransactionStatus,
        transaction: Transaction,
    },
    /// No stored transaction matches the event; not an error
    NotFound { identifier: Option<String> },
}

impl ApplyOutcome {
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            ApplyOutcome::Updated { transaction, .. } => Some(transaction),
            ApplyOutcome::NotFound { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApplyOutcome::NotFound { .. })
    }
}

pub struct TransactionStateEngine {
    store: Arc<dyn TransactionStore>,
    policy: TerminalPolicy,
}

impl TransactionStateEngine {
    pub fn new(store: Arc<dyn TransactionStore>, policy: TerminalPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    /// Apply `event` received from `provider`
    pub async fn apply(&self, provider: &str, event: &NormalizedEvent) -> AppResult<ApplyOutcome> {
        let identifier = event.identifier().map(str::to_string);

        if identifier.is_none() {
            warn!(provider, kind = %event.kind, "Webhook carries no usable identifier");
            return Ok(ApplyOutcome::NotFound { identifier: None });
        }

        let current = self
            .locate(event)
            .await
            .map_err(|e| processing_failed(provider, event, e))?;

        let Some(current) = current else {
            warn!(
                provider,
                kind = %event.kind,
                external_id = ?event.external_id,
                alternate_id = ?event.alternate_id,
                "No transaction matches webhook"
            );
            return Ok(ApplyOutcome::NotFound { identifier });
        };

        let policy = self.policy;
        let received_at = Utc::now();
        let owned_event = event.clone();
        let (before, after) = self
            .store
            .update_locked(
                event.kind,
                current.id,
                Box::new(move |locked| apply_event(locked, &owned_event, policy, received_at)),
            )
            .await
            .map_err(|e| processing_failed(provider, event, e))?;

        if accepts(&before, event, policy) {
            info!(
                provider,
                kind = %event.kind,
                transaction_id = %after.id,
                external_id = ?after.external_id,
                old_status = %before.status,
                new_status = %after.status,
                "Webhook applied"
            );
        } else {
            warn!(
                provider,
                kind = %event.kind,
                transaction_id = %after.id,
                current_status = %before.status,
                event_status = ?event.status,
                "Webhook recorded without state change"
            );
        }

        Ok(ApplyOutcome::Updated {
            previous: before.status,
            transaction: after,
        })
    }

    /// External id first, then the alternate id, then the platform id it may embed
    async fn locate(&self, event: &NormalizedEvent) -> Result<Option<Transaction>, DatabaseError> {
        let kind = event.kind;

        if let Some(external_id) = &event.external_id {
            if let Some(found) = self.store.find_by_external_id(kind, external_id).await? {
                return Ok(Some(found));
            }
        }

        let Some(alternate_id) = &event.alternate_id else {
            return Ok(None);
        };

        if let Some(found) = self.store.find_by_external_id(kind, alternate_id).await? {
            return Ok(Some(found));
        }

        match embedded_uuid(alternate_id) {
            Some(id) => self.store.find_by_id(kind, id).await,
            None => Ok(None),
        }
    }
}

/// Platform id carried as `<uuid>`, `PIX<uuid>` or `WD<uuid>`
fn embedded_uuid(identifier: &str) -> Option<Uuid> {
    let trimmed = identifier
        .strip_prefix("PIX")
        .or_else(|| identifier.strip_prefix("WD"))
        .unwrap_or(identifier);
    Uuid::parse_str(trimmed).ok()
}

fn processing_failed(provider: &str, event: &NormalizedEvent, error: DatabaseError) -> AppError {
    warn!(provider, kind = %event.kind, error = %error, "Webhook persistence failed");
    AppError::new(AppErrorKind::WebhookProcessingFailed {
        provider: provider.to_string(),
        kind: event.kind,
        identifier: event.identifier().map(str::to_string),
        message: error.to_string(),
        payload_excerpt: payload_excerpt(&event.raw_metadata),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::InMemoryTransactionStore;
    use crate::payments::types::{TransactionDetails, TransactionKind};
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn seeded(external_id: &str) -> (TransactionStateEngine, Transaction) {
        let store = Arc::new(InMemoryTransactionStore::new());
        let tx = Transaction::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            external_id.to_string(),
            dec!(25.00),
            TransactionDetails::empty(TransactionKind::Withdrawal),
            json!({}),
        );
        store.insert(&tx).await.unwrap();
        (TransactionStateEngine::new(store, TerminalPolicy::Reject), tx)
    }

    fn withdrawal_event(status: TransactionStatus) -> NormalizedEvent {
        let mut event = NormalizedEvent::new(TransactionKind::Withdrawal);
        event.status = Some(status);
        event
    }

    #[tokio::test]
    async fn test_apply_by_external_id() {
        let (engine, tx) = seeded("WD-EXT").await;
        let mut event = withdrawal_event(TransactionStatus::Success);
        event.external_id = Some("WD-EXT".into());

        let outcome = engine.apply("SubadqB", &event).await.unwrap();
        match outcome {
            ApplyOutcome::Updated { previous, transaction } => {
                assert_eq!(previous, TransactionStatus::Pending);
                assert_eq!(transaction.status, TransactionStatus::Success);
                assert_eq!(transaction.id, tx.id);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_alternate_platform_id() {
        let (engine, tx) = seeded("WD-EXT").await;
        let mut event = withdrawal_event(TransactionStatus::Success);
        event.external_id = Some("UNKNOWN".into());
        event.alternate_id = Some(format!("WD{}", tx.id));

        let outcome = engine.apply("SubadqA", &event).await.unwrap();
        assert_eq!(outcome.transaction().map(|t| t.id), Some(tx.id));
    }

    #[tokio::test]
    async fn test_unknown_identifier_is_not_found() {
        let (engine, _) = seeded("WD-EXT").await;
        let mut event = withdrawal_event(TransactionStatus::Success);
        event.external_id = Some("NOPE".into());

        let outcome = engine.apply("SubadqA", &event).await.unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::NotFound {
                identifier: Some("NOPE".into())
            }
        );
    }

    #[tokio::test]
    async fn test_event_without_identifier_is_not_found() {
        let (engine, _) = seeded("WD-EXT").await;
        let outcome = engine
            .apply("SubadqA", &withdrawal_event(TransactionStatus::Success))
            .await
            .unwrap();
        assert!(outcome.is_not_found());
    }

    #[test]
    fn test_embedded_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(embedded_uuid(&format!("PIX{}", id)), Some(id));
        assert_eq!(embedded_uuid(&id.to_string()), Some(id));
        assert_eq!(embedded_uuid("PIX123"), None);
    }
}
