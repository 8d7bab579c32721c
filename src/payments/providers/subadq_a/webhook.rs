//! SubadqA webhook normalizer
//!
//! SubadqA posts flat events: `transaction_id` is the id returned at creation
//! and `pix_id` / `withdraw_id` is a secondary reference.

use crate::error::AppResult;
use crate::payments::normalize::{
    amount_field, map_status, require_object, string_field, timestamp_field, StatusTable,
};
use crate::payments::types::{
    amount_json, ChargeDetails, NormalizedEvent, Transaction, TransactionDetails,
    TransactionKind, TransactionStatus, WithdrawalDetails,
};
use chrono::Utc;
use serde_json::{json, Map, Value};

pub const PROVIDER: &str = "SubadqA";

pub const PIX_STATUSES: StatusTable = &[
    ("PENDING", TransactionStatus::Pending),
    ("PROCESSING", TransactionStatus::Processing),
    ("CONFIRMED", TransactionStatus::Confirmed),
    ("PAID", TransactionStatus::Paid),
    ("CANCELLED", TransactionStatus::Cancelled),
    ("CANCELED", TransactionStatus::Cancelled),
    ("FAILED", TransactionStatus::Failed),
];

pub const WITHDRAW_STATUSES: StatusTable = &[
    ("PENDING", TransactionStatus::Pending),
    ("PROCESSING", TransactionStatus::Processing),
    ("SUCCESS", TransactionStatus::Success),
    ("DONE", TransactionStatus::Done),
    ("FAILED", TransactionStatus::Failed),
    ("CANCELLED", TransactionStatus::Cancelled),
    ("CANCELED", TransactionStatus::Cancelled),
];

pub fn normalize(payload: &Value, kind: TransactionKind) -> AppResult<NormalizedEvent> {
    match kind {
        TransactionKind::Charge => normalize_pix(payload),
        TransactionKind::Withdrawal => normalize_withdraw(payload),
    }
}

pub fn normalize_pix(payload: &Value) -> AppResult<NormalizedEvent> {
    let data = require_object(PROVIDER, TransactionKind::Charge, payload)?;

    let mut event = NormalizedEvent::new(TransactionKind::Charge);
    event.external_id = primary_id(data);
    event.alternate_id = string_field(data, "pix_id");
    event.status = map_status(PROVIDER, data.get("status"), PIX_STATUSES);
    event.amount = amount_field(PROVIDER, data, "amount");
    event.details = TransactionDetails::Charge(ChargeDetails {
        payer_name: string_field(data, "payer_name"),
        payer_document: string_field(data, "payer_cpf")
            .or_else(|| string_field(data, "payer_document")),
        payment_date: timestamp_field(PROVIDER, data, "payment_date"),
    });
    event.raw_metadata = payload.clone();
    Ok(event)
}

pub fn normalize_withdraw(payload: &Value) -> AppResult<NormalizedEvent> {
    let data = require_object(PROVIDER, TransactionKind::Withdrawal, payload)?;

    let mut event = NormalizedEvent::new(TransactionKind::Withdrawal);
    event.external_id = primary_id(data);
    event.alternate_id = string_field(data, "withdraw_id");
    event.status = map_status(PROVIDER, data.get("status"), WITHDRAW_STATUSES);
    event.amount = amount_field(PROVIDER, data, "amount");
    event.details = TransactionDetails::Withdrawal(WithdrawalDetails {
        bank_account: data.get("bank_account").filter(|v| v.is_object()).cloned(),
        requested_at: timestamp_field(PROVIDER, data, "requested_at"),
        completed_at: timestamp_field(PROVIDER, data, "completed_at"),
    });
    event.raw_metadata = payload.clone();
    Ok(event)
}

fn primary_id(data: &Map<String, Value>) -> Option<String> {
    string_field(data, "transaction_id")
        .or_else(|| string_field(data, "external_id"))
        .or_else(|| string_field(data, "id"))
}

/// Payload SubadqA would send once `transaction` settles
pub fn simulated_payload(transaction: &Transaction) -> Value {
    let external_id = transaction.external_id.clone().unwrap_or_default();
    let now = Utc::now().to_rfc3339();

    match &transaction.details {
        TransactionDetails::Charge(details) => json!({
            "event": "pix_payment_confirmed",
            "transaction_id": external_id,
            "pix_id": format!("PIX{}", transaction.id),
            "status": "CONFIRMED",
            "amount": amount_json(&transaction.amount),
            "payer_name": details.payer_name,
            "payer_cpf": details.payer_document,
            "payment_date": now,
            "metadata": {
                "source": PROVIDER,
                "environment": "sandbox",
                "simulated": true,
            }
        }),
        TransactionDetails::Withdrawal(details) => json!({
            "event": "withdraw_completed",
            "withdraw_id": format!("WD{}", transaction.id),
            "transaction_id": external_id,
            "status": "SUCCESS",
            "amount": amount_json(&transaction.amount),
            "requested_at": transaction.created_at.to_rfc3339(),
            "completed_at": now,
            "metadata": {
                "source": PROVIDER,
                "destination_bank": details
                    .bank_account
                    .as_ref()
                    .and_then(|account| account.get("bank_code"))
                    .cloned()
                    .unwrap_or(Value::Null),
                "simulated": true,
            }
        }),
    }
}
