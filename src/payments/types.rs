//! Canonical payment types
//!
//! Provider-independent request, event and transaction shapes shared by
//! every adapter, the state engine and the persistence layer.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The two transaction kinds handled by every provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// PIX charge (money in)
    Charge,
    /// Bank withdrawal (money out)
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Charge => "CHARGE",
            TransactionKind::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Parses the kind tag attached to inbound webhooks (`pix` / `withdraw`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pix" | "charge" => Some(TransactionKind::Charge),
            "withdraw" | "withdrawal" => Some(TransactionKind::Withdrawal),
            _ => None,
        }
    }

    /// Kind-specific alternate identifier field carried by provider events
    pub fn alternate_id_field(&self) -> &'static str {
        match self {
            TransactionKind::Charge => "pix_id",
            TransactionKind::Withdrawal => "withdraw_id",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical status vocabulary shared across kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    /// Charge paid
    Confirmed,
    /// Charge paid, equivalent to `Confirmed`
    Paid,
    /// Withdrawal completed
    Success,
    /// Withdrawal completed, equivalent to `Success`
    Done,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 8] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Confirmed,
        TransactionStatus::Paid,
        TransactionStatus::Success,
        TransactionStatus::Done,
        TransactionStatus::Failed,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::Paid => "PAID",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Done => "DONE",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Processing
        )
    }

    /// Position along the lifecycle; statuses only move forward
    pub fn progress(&self) -> u8 {
        match self {
            TransactionStatus::Pending => 0,
            TransactionStatus::Processing => 1,
            _ => 2,
        }
    }

    /// Whether the status belongs to the vocabulary of `kind`
    pub fn applies_to(&self, kind: TransactionKind) -> bool {
        match self {
            TransactionStatus::Confirmed | TransactionStatus::Paid => {
                kind == TransactionKind::Charge
            }
            TransactionStatus::Success | TransactionStatus::Done => {
                kind == TransactionKind::Withdrawal
            }
            _ => true,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        TransactionStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == upper)
            .ok_or_else(|| format!("unknown transaction status '{}'", s))
    }
}

/// Provider configuration as stored by the platform
///
/// Read-only to the core; the `config` blob carries headers, auth material
/// and mock markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct ProviderConfig {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub config: Value,
    pub active: bool,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, config: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_url: base_url.into(),
            config,
            active: true,
        }
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Headers configured for this provider, string values only
    pub fn headers(&self) -> HashMap<String, String> {
        self.setting("headers")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(name, value)| {
                        value.as_str().map(|v| (name.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn mock_response_header(&self) -> Option<&str> {
        self.setting("mock_response_header").and_then(Value::as_str)
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.setting("webhook_secret")
            .and_then(Value::as_str)
            .filter(|secret| !secret.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Checking,
    Savings,
}

/// Destination account for a withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub bank_code: String,
    pub agency: String,
    pub account: String,
    pub account_type: AccountType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_document: Option<String>,
}

/// Canonical charge request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub payer_name: Option<String>,
    #[serde(default, alias = "payer_cpf")]
    pub payer_document: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Caller's order reference, forwarded where the provider supports one
    #[serde(default)]
    pub reference: Option<String>,
}

/// Canonical withdrawal request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Decimal,
    pub bank_account: BankAccount,
}

/// Raw decoded provider response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
}

/// Charge-specific fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargeDetails {
    pub payer_name: Option<String>,
    pub payer_document: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

/// Withdrawal-specific fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalDetails {
    pub bank_account: Option<Value>,
    pub requested_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionDetails {
    Charge(ChargeDetails),
    Withdrawal(WithdrawalDetails),
}

impl TransactionDetails {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionDetails::Charge(_) => TransactionKind::Charge,
            TransactionDetails::Withdrawal(_) => TransactionKind::Withdrawal,
        }
    }

    pub fn empty(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Charge => TransactionDetails::Charge(ChargeDetails::default()),
            TransactionKind::Withdrawal => {
                TransactionDetails::Withdrawal(WithdrawalDetails::default())
            }
        }
    }
}

/// Provider event translated into the canonical vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub kind: TransactionKind,
    pub external_id: Option<String>,
    /// `pix_id` / `withdraw_id` carried by the event
    pub alternate_id: Option<String>,
    /// `None` when the payload omits a status
    pub status: Option<TransactionStatus>,
    pub amount: Option<Decimal>,
    pub details: TransactionDetails,
    /// Payload as received
    pub raw_metadata: Value,
}

impl NormalizedEvent {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            external_id: None,
            alternate_id: None,
            status: None,
            amount: None,
            details: TransactionDetails::empty(kind),
            raw_metadata: Value::Object(Map::new()),
        }
    }

    /// First identifier usable for lookup
    pub fn identifier(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .or(self.alternate_id.as_deref())
    }
}

/// Persisted charge or withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub provider_id: Uuid,
    pub external_id: Option<String>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub details: TransactionDetails,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New record in `PENDING` right after the provider acknowledged it
    pub fn pending(
        owner_id: Uuid,
        provider_id: Uuid,
        external_id: String,
        amount: Decimal,
        details: TransactionDetails,
        provider_response: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            provider_id,
            external_id: Some(external_id),
            amount,
            status: TransactionStatus::Pending,
            details,
            metadata: json!({
                "provider_response": provider_response,
                "created_at": now.to_rfc3339(),
                "webhooks": [],
            }),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.details.kind()
    }

    /// Number of webhook entries recorded in metadata
    pub fn webhook_count(&self) -> usize {
        self.metadata
            .get("webhooks")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// Renders a decimal amount as a JSON number
pub fn amount_json(amount: &Decimal) -> Value {
    amount
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(amount.to_string()))
}
