//! Defensive field readers shared by webhook normalizers

use crate::error::{AppError, AppResult};
use crate::payments::types::{TransactionKind, TransactionStatus};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;

/// Case-insensitive lookup table from provider status to canonical status
pub type StatusTable = &'static [(&'static str, TransactionStatus)];

/// Maps a provider status through `table`
///
/// Returns `None` when the payload carries no status; unknown values map to
/// `PENDING`.
pub fn map_status(
    provider: &str,
    raw: Option<&Value>,
    table: StatusTable,
) -> Option<TransactionStatus> {
    let raw = match raw {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };

    let status = table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&raw))
        .map(|(_, status)| *status);

    match status {
        Some(status) => Some(status),
        None => {
            warn!(provider, status = %raw, "Unknown provider status, treating as PENDING");
            Some(TransactionStatus::Pending)
        }
    }
}

/// The payload must be a JSON object
pub fn require_object<'a>(
    provider: &str,
    kind: TransactionKind,
    payload: &'a Value,
) -> AppResult<&'a Map<String, Value>> {
    payload.as_object().ok_or_else(|| {
        AppError::normalization(
            provider,
            kind,
            format!("expected a JSON object, got {}", json_type(payload)),
        )
    })
}

/// Non-empty string or number field rendered as a string
pub fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Amount from a number or numeric string, rounded to cents
pub fn amount_field(provider: &str, object: &Map<String, Value>, key: &str) -> Option<Decimal> {
    let raw = match object.get(key)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };

    match Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)) {
        Ok(amount) => Some(amount.round_dp(2)),
        Err(_) => {
            warn!(provider, field = key, value = %raw, "Malformed amount, ignoring");
            None
        }
    }
}

/// Timestamp field parsed defensively; malformed values become `None`
pub fn timestamp_field(
    provider: &str,
    object: &Map<String, Value>,
    key: &str,
) -> Option<DateTime<Utc>> {
    let raw = match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Null => return None,
        Value::Number(n) => {
            return n
                .as_i64()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        }
        _ => {
            warn!(provider, field = key, "Timestamp field has unexpected type, ignoring");
            return None;
        }
    };

    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        warn!(provider, field = key, value = %raw, "Malformed timestamp, ignoring");
    }
    parsed
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const TABLE: StatusTable = &[
        ("PAID", TransactionStatus::Paid),
        ("PENDING", TransactionStatus::Pending),
    ];

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_map_status_is_case_insensitive() {
        assert_eq!(
            map_status("P", Some(&json!("paid")), TABLE),
            Some(TransactionStatus::Paid)
        );
        assert_eq!(
            map_status("P", Some(&json!(" Paid ")), TABLE),
            Some(TransactionStatus::Paid)
        );
    }

    #[test]
    fn test_unknown_status_maps_to_pending() {
        assert_eq!(
            map_status("P", Some(&json!("WEIRD")), TABLE),
            Some(TransactionStatus::Pending)
        );
        assert_eq!(
            map_status("P", Some(&json!(7)), TABLE),
            Some(TransactionStatus::Pending)
        );
        assert_eq!(map_status("P", None, TABLE), None);
    }

    #[test]
    fn test_require_object_rejects_arrays() {
        let err = require_object("P", TransactionKind::Charge, &json!([1, 2])).unwrap_err();
        assert_eq!(err.error_code(), "NORMALIZATION_FAILED");
    }

    #[test]
    fn test_amount_field_accepts_numbers_and_strings() {
        let obj = object(json!({"a": 50.0, "b": "12.345", "c": "abc", "d": null}));
        assert_eq!(amount_field("P", &obj, "a"), Some(dec!(50)));
        assert_eq!(amount_field("P", &obj, "b"), Some(dec!(12.34)));
        assert_eq!(amount_field("P", &obj, "c"), None);
        assert_eq!(amount_field("P", &obj, "d"), None);
        assert_eq!(amount_field("P", &obj, "missing"), None);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01"), Some(expected));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_malformed_timestamp_is_absent() {
        let obj = object(json!({"at": "31/31/2025", "n": 1735689600}));
        assert_eq!(timestamp_field("P", &obj, "at"), None);
        assert_eq!(
            timestamp_field("P", &obj, "n"),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_string_field_renders_numbers() {
        let obj = object(json!({"id": 12, "blank": "", "name": " Bob "}));
        assert_eq!(string_field(&obj, "id").as_deref(), Some("12"));
        assert_eq!(string_field(&obj, "blank"), None);
        assert_eq!(string_field(&obj, "name").as_deref(), Some("Bob"));
    }
}
