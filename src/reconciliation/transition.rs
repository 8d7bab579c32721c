//! Pure state transition applied under the per-transaction lock

use crate::payments::types::{NormalizedEvent, Transaction, TransactionDetails, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::str::FromStr;

/// What to do with an event that would move a transaction backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalPolicy {
    /// Terminal states are final and statuses never move backwards
    #[default]
    Reject,
    /// Every event overwrites the current status
    Overwrite,
}

impl FromStr for TerminalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(TerminalPolicy::Reject),
            "overwrite" => Ok(TerminalPolicy::Overwrite),
            other => Err(format!("unknown terminal policy '{}'", other)),
        }
    }
}

/// Whether `event` may change `current` under `policy`
pub fn accepts(current: &Transaction, event: &NormalizedEvent, policy: TerminalPolicy) -> bool {
    if event.kind != current.kind() {
        return false;
    }
    let target = event.status.unwrap_or(current.status);
    if !target.applies_to(current.kind()) {
        return false;
    }

    match policy {
        TerminalPolicy::Overwrite => true,
        TerminalPolicy::Reject => {
            if current.status.is_terminal() {
                event.status == Some(current.status)
            } else {
                target.progress() >= current.status.progress()
            }
        }
    }
}

/// Next state of `current` after `event`
///
/// Rejected events leave status and fields untouched; every event, accepted
/// or not, is appended to `metadata.webhooks`.
pub fn apply_event(
    current: &Transaction,
    event: &NormalizedEvent,
    policy: TerminalPolicy,
    received_at: DateTime<Utc>,
) -> Transaction {
    let mut next = current.clone();
    let applied = accepts(current, event, policy);

    if applied {
        if let Some(status) = event.status {
            next.status = status;
        }
        if let Some(amount) = event.amount {
            next.amount = amount;
        }
        if next.external_id.is_none() {
            next.external_id = event.external_id.clone();
        }
        merge_details(&mut next.details, &event.details);
    }

    append_webhook(&mut next.metadata, event, applied, received_at);
    next.updated_at = received_at;
    next
}

fn merge_details(current: &mut TransactionDetails, incoming: &TransactionDetails) {
    match (current, incoming) {
        (TransactionDetails::Charge(current), TransactionDetails::Charge(incoming)) => {
            if incoming.payer_name.is_some() {
                current.payer_name = incoming.payer_name.clone();
            }
            if incoming.payer_document.is_some() {
                current.payer_document = incoming.payer_document.clone();
            }
            if incoming.payment_date.is_some() {
                current.payment_date = incoming.payment_date;
            }
        }
        (TransactionDetails::Withdrawal(current), TransactionDetails::Withdrawal(incoming)) => {
            if incoming.bank_account.is_some() {
                current.bank_account = incoming.bank_account.clone();
            }
            if incoming.requested_at.is_some() {
                current.requested_at = incoming.requested_at;
            }
            if incoming.completed_at.is_some() {
                current.completed_at = incoming.completed_at;
            }
        }
        _ => {}
    }
}

fn append_webhook(
    metadata: &mut Value,
    event: &NormalizedEvent,
    applied: bool,
    received_at: DateTime<Utc>,
) {
    if !metadata.is_object() {
        let previous = metadata.take();
        let mut wrapped = Map::new();
        if !previous.is_null() {
            wrapped.insert("previous".into(), previous);
        }
        *metadata = Value::Object(wrapped);
    }

    let received = received_at.to_rfc3339();
    let entry = json!({
        "received_at": received,
        "status": event.status.map(|s| s.as_str()),
        "applied": applied,
        "raw_event": event.raw_metadata,
    });

    if let Value::Object(map) = metadata {
        match map.get_mut("webhooks") {
            Some(Value::Array(entries)) => entries.push(entry),
            _ => {
                map.insert("webhooks".into(), Value::Array(vec![entry]));
            }
        }
        map.insert("last_webhook_at".into(), Value::String(received));
    }
}

/// Statuses considered "paid" or "completed", for display purposes
pub fn is_settled(status: TransactionStatus) -> bool {
    matches!(
        status,
        TransactionStatus::Confirmed
            | TransactionStatus::Paid
            | TransactionStatus::Success
            | TransactionStatus::Done
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{ChargeDetails, TransactionKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn charge(status: TransactionStatus) -> Transaction {
        let mut tx = Transaction::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "PX1".into(),
            dec!(10.00),
            TransactionDetails::Charge(ChargeDetails::default()),
            json!({}),
        );
        tx.status = status;
        tx
    }

    fn event(status: Option<TransactionStatus>) -> NormalizedEvent {
        let mut event = NormalizedEvent::new(TransactionKind::Charge);
        event.external_id = Some("PX1".into());
        event.status = status;
        event.amount = Some(dec!(50.00));
        event.details = TransactionDetails::Charge(ChargeDetails {
            payer_name: Some("Bob".into()),
            payer_document: None,
            payment_date: None,
        });
        event
    }

    fn apply(
        tx: &Transaction,
        status: Option<TransactionStatus>,
        policy: TerminalPolicy,
    ) -> Transaction {
        apply_event(tx, &event(status), policy, Utc::now())
    }

    #[test]
    fn test_pending_to_paid() {
        let tx = charge(TransactionStatus::Pending);
        let next = apply(&tx, Some(TransactionStatus::Paid), TerminalPolicy::Reject);

        assert_eq!(next.status, TransactionStatus::Paid);
        assert_eq!(next.amount, dec!(50.00));
        assert_eq!(next.webhook_count(), 1);
        assert_eq!(next.metadata["webhooks"][0]["applied"], true);
        match next.details {
            TransactionDetails::Charge(details) => {
                assert_eq!(details.payer_name.as_deref(), Some("Bob"))
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_terminal_state_is_not_regressed() {
        let tx = charge(TransactionStatus::Paid);
        let next = apply(&tx, Some(TransactionStatus::Pending), TerminalPolicy::Reject);

        assert_eq!(next.status, TransactionStatus::Paid);
        assert_eq!(next.amount, dec!(10.00));
        assert_eq!(next.metadata["webhooks"][0]["applied"], false);
    }

    #[test]
    fn test_overwrite_policy_allows_correction() {
        let tx = charge(TransactionStatus::Paid);
        let next = apply(&tx, Some(TransactionStatus::Cancelled), TerminalPolicy::Overwrite);
        assert_eq!(next.status, TransactionStatus::Cancelled);
    }

    #[test]
    fn test_processing_is_not_moved_back_to_pending() {
        let tx = charge(TransactionStatus::Processing);
        let next = apply(&tx, Some(TransactionStatus::Pending), TerminalPolicy::Reject);
        assert_eq!(next.status, TransactionStatus::Processing);
    }

    #[test]
    fn test_missing_status_keeps_current() {
        let tx = charge(TransactionStatus::Processing);
        let next = apply_event(&tx, &event(None), TerminalPolicy::Reject, Utc::now());
        assert_eq!(next.status, TransactionStatus::Processing);
        assert_eq!(next.amount, dec!(50.00));
    }

    #[test]
    fn test_wrong_vocabulary_is_rejected() {
        let tx = charge(TransactionStatus::Pending);
        let next = apply(&tx, Some(TransactionStatus::Success), TerminalPolicy::Reject);
        assert_eq!(next.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_metadata_is_append_only() {
        let mut tx = charge(TransactionStatus::Pending);
        tx.metadata = json!({"provider_response": {"id": "PX1"}});

        let first = apply(&tx, Some(TransactionStatus::Processing), TerminalPolicy::Reject);
        let second = apply(&first, Some(TransactionStatus::Paid), TerminalPolicy::Reject);

        assert_eq!(second.metadata["provider_response"]["id"], "PX1");
        assert_eq!(second.webhook_count(), 2);
        assert_eq!(second.metadata["webhooks"][0]["status"], "PROCESSING");
        assert!(second.metadata.get("last_webhook_at").is_some());
    }

    #[test]
    fn test_non_object_metadata_is_preserved() {
        let mut tx = charge(TransactionStatus::Pending);
        tx.metadata = json!("legacy");
        let next = apply_event(&tx, &event(None), TerminalPolicy::Reject, Utc::now());
        assert_eq!(next.metadata["previous"], "legacy");
        assert_eq!(next.webhook_count(), 1);
    }

    #[test]
    fn test_terminal_policy_parsing() {
        assert_eq!("REJECT".parse::<TerminalPolicy>(), Ok(TerminalPolicy::Reject));
        assert_eq!("overwrite".parse::<TerminalPolicy>(), Ok(TerminalPolicy::Overwrite));
        assert!("sometimes".parse::<TerminalPolicy>().is_err());
    }
}
