//! External identifier extraction from provider create responses

use crate::payments::types::TransactionKind;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tracing::warn;

const CHARGE_ID_FIELDS: [&str; 5] = ["id", "transaction_id", "pix_id", "external_id", "charge_id"];
const WITHDRAWAL_ID_FIELDS: [&str; 5] = [
    "id",
    "transaction_id",
    "withdraw_id",
    "external_id",
    "transfer_id",
];

/// Prefix of locally generated placeholder identifiers
pub const PLACEHOLDER_PREFIX: &str = "TEMP_";

/// Identifier fields checked in order of preference
pub fn id_fields(kind: TransactionKind) -> &'static [&'static str] {
    match kind {
        TransactionKind::Charge => &CHARGE_ID_FIELDS,
        TransactionKind::Withdrawal => &WITHDRAWAL_ID_FIELDS,
    }
}

/// Finds the provider's identifier in a create response
///
/// Looks at the top level first, then inside a `data` envelope. Numeric ids
/// are rendered as strings.
pub fn find_external_id(body: &Value, kind: TransactionKind) -> Option<String> {
    let scopes = [Some(body), body.get("data")];
    scopes
        .into_iter()
        .flatten()
        .find_map(|scope| {
            id_fields(kind)
                .iter()
                .find_map(|field| scope.get(*field).and_then(id_string))
        })
}

/// Like [`find_external_id`], falling back to a fresh placeholder
pub fn extract_external_id(body: &Value, kind: TransactionKind, provider: &str) -> String {
    match find_external_id(body, kind) {
        Some(id) => id,
        None => {
            let placeholder = placeholder_id();
            warn!(
                provider,
                kind = %kind,
                placeholder = %placeholder,
                "No external identifier in provider response, using placeholder"
            );
            placeholder
        }
    }
}

pub fn placeholder_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!(
        "{}{}_{}",
        PLACEHOLDER_PREFIX,
        Utc::now().timestamp_micros(),
        suffix
    )
}

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(PLACEHOLDER_PREFIX)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
