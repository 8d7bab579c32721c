//! SubadqB webhook normalizer
//!
//! SubadqB wraps the event under `data` and sends a detached top-level
//! `signature`. Withdrawals report `DONE`, which canonicalises to `SUCCESS`.

use crate::error::{AppError, AppResult};
use crate::payments::normalize::{
    amount_field, map_status, require_object, string_field, timestamp_field, StatusTable,
};
use crate::payments::types::{
    amount_json, ChargeDetails, NormalizedEvent, Transaction, TransactionDetails,
    TransactionKind, TransactionStatus, WithdrawalDetails,
};
use chrono::Utc;
use serde_json::{json, Map, Value};

pub const PROVIDER: &str = "SubadqB";

pub const PIX_STATUSES: StatusTable = &[
    ("CONFIRMED", TransactionStatus::Confirmed),
    ("PAID", TransactionStatus::Paid),
    ("PENDING", TransactionStatus::Pending),
    ("PROCESSING", TransactionStatus::Processing),
    ("CANCELLED", TransactionStatus::Cancelled),
    ("FAILED", TransactionStatus::Failed),
];

pub const WITHDRAW_STATUSES: StatusTable = &[
    ("SUCCESS", TransactionStatus::Success),
    ("DONE", TransactionStatus::Success),
    ("PENDING", TransactionStatus::Pending),
    ("PROCESSING", TransactionStatus::Processing),
    ("FAILED", TransactionStatus::Failed),
    ("CANCELLED", TransactionStatus::Cancelled),
];

pub fn normalize(payload: &Value, kind: TransactionKind) -> AppResult<NormalizedEvent> {
    match kind {
        TransactionKind::Charge => normalize_pix(payload),
        TransactionKind::Withdrawal => normalize_withdraw(payload),
    }
}

pub fn normalize_pix(payload: &Value) -> AppResult<NormalizedEvent> {
    let envelope = require_object(PROVIDER, TransactionKind::Charge, payload)?;
    let data = unwrap_data(envelope, TransactionKind::Charge)?;

    let payer = data.get("payer").and_then(Value::as_object);

    let mut event = NormalizedEvent::new(TransactionKind::Charge);
    event.external_id = string_field(data, "id");
    event.alternate_id = string_field(data, "pix_id");
    event.status = map_status(PROVIDER, data.get("status"), PIX_STATUSES);
    event.amount =
        amount_field(PROVIDER, data, "value").or_else(|| amount_field(PROVIDER, data, "amount"));
    event.details = TransactionDetails::Charge(ChargeDetails {
        payer_name: payer.and_then(|p| string_field(p, "name")),
        payer_document: payer.and_then(|p| string_field(p, "document")),
        payment_date: timestamp_field(PROVIDER, data, "confirmed_at"),
    });
    event.raw_metadata = payload.clone();
    Ok(event)
}

pub fn normalize_withdraw(payload: &Value) -> AppResult<NormalizedEvent> {
    let envelope = require_object(PROVIDER, TransactionKind::Withdrawal, payload)?;
    let data = unwrap_data(envelope, TransactionKind::Withdrawal)?;

    let mut event = NormalizedEvent::new(TransactionKind::Withdrawal);
    event.external_id = string_field(data, "id");
    event.alternate_id = string_field(data, "withdraw_id");
    event.status = map_status(PROVIDER, data.get("status"), WITHDRAW_STATUSES);
    event.amount =
        amount_field(PROVIDER, data, "amount").or_else(|| amount_field(PROVIDER, data, "value"));
    event.details = TransactionDetails::Withdrawal(WithdrawalDetails {
        bank_account: data.get("bank_account").filter(|v| v.is_object()).cloned(),
        requested_at: timestamp_field(PROVIDER, data, "requested_at"),
        completed_at: timestamp_field(PROVIDER, data, "processed_at")
            .or_else(|| timestamp_field(PROVIDER, data, "completed_at")),
    });
    event.raw_metadata = payload.clone();
    Ok(event)
}

/// `data` when present, the envelope itself otherwise
fn unwrap_data<'a>(
    envelope: &'a Map<String, Value>,
    kind: TransactionKind,
) -> AppResult<&'a Map<String, Value>> {
    match envelope.get("data") {
        None | Some(Value::Null) => Ok(envelope),
        Some(Value::Object(data)) => Ok(data),
        Some(_) => Err(AppError::normalization(
            PROVIDER,
            kind,
            "'data' must be an object",
        )),
    }
}

fn random_signature() -> String {
    hex::encode(rand::random::<[u8; 6]>())
}

/// Payload SubadqB would send once `transaction` settles
pub fn simulated_payload(transaction: &Transaction) -> Value {
    let external_id = transaction.external_id.clone().unwrap_or_default();
    let now = Utc::now().to_rfc3339();

    match &transaction.details {
        TransactionDetails::Charge(details) => json!({
            "type": "pix.status_update",
            "data": {
                "id": external_id,
                "pix_id": format!("PIX{}", transaction.id),
                "status": "PAID",
                "value": amount_json(&transaction.amount),
                "payer": {
                    "name": details.payer_name,
                    "document": details.payer_document,
                },
                "confirmed_at": now,
            },
            "signature": random_signature(),
        }),
        TransactionDetails::Withdrawal(details) => json!({
            "type": "withdraw.status_update",
            "data": {
                "id": external_id,
                "withdraw_id": format!("WD{}", transaction.id),
                "status": "DONE",
                "amount": amount_json(&transaction.amount),
                "bank_account": details.bank_account,
                "processed_at": now,
            },
            "signature": random_signature(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_pix_nested_payload() {
        let payload = json!({
            "data": {
                "id": "PX1",
                "status": "PAID",
                "value": 50.0,
                "payer": {"name": "Bob", "document": "1"},
                "confirmed_at": "2025-01-01T00:00:00Z"
            },
            "signature": "ab12"
        });

        let event = normalize_pix(&payload).unwrap();
        assert_eq!(event.external_id.as_deref(), Some("PX1"));
        assert_eq!(event.status, Some(TransactionStatus::Paid));
        assert_eq!(event.amount, Some(dec!(50.0)));
        assert_eq!(event.raw_metadata, payload);
        assert_eq!(
            event.details,
            TransactionDetails::Charge(ChargeDetails {
                payer_name: Some("Bob".into()),
                payer_document: Some("1".into()),
                payment_date: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            })
        );
    }

    #[test]
    fn test_done_canonicalises_to_success() {
        let payload = json!({
            "data": {"id": "W1", "status": "done", "processed_at": "2025-02-01 10:00:00"}
        });
        let event = normalize_withdraw(&payload).unwrap();
        assert_eq!(event.status, Some(TransactionStatus::Success));
        match event.details {
            TransactionDetails::Withdrawal(details) => assert!(details.completed_at.is_some()),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[test]
    fn test_payload_without_envelope() {
        let event = normalize_pix(&json!({"id": "PX2", "status": "WEIRD"})).unwrap();
        assert_eq!(event.external_id.as_deref(), Some("PX2"));
        assert_eq!(event.status, Some(TransactionStatus::Pending));
    }

    #[test]
    fn test_non_object_data_fails() {
        let err = normalize_pix(&json!({"data": [1, 2, 3]})).unwrap_err();
        assert_eq!(err.error_code(), "NORMALIZATION_FAILED");
    }

    #[test]
    fn test_simulated_signature_is_hex() {
        let signature = random_signature();
        assert_eq!(signature.len(), 12);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
