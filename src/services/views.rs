//! Caller-facing transaction views
//!
//! List views omit `updated_at` and `metadata`; detail views include them.

use crate::payments::types::{Transaction, TransactionDetails, TransactionKind, TransactionStatus};
use crate::reconciliation::transition::is_settled;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayFields {
    Charge {
        payer_name: Option<String>,
        payer_cpf: Option<String>,
        payment_date: Option<DateTime<Utc>>,
    },
    Withdrawal {
        bank_account: Option<Value>,
        requested_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub external_id: Option<String>,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub settled: bool,
    #[serde(flatten)]
    pub fields: DisplayFields,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub summary: TransactionSummary,
    pub updated_at: DateTime<Utc>,
    pub metadata: Value,
}

impl From<&Transaction> for TransactionSummary {
    fn from(tx: &Transaction) -> Self {
        let fields = match &tx.details {
            TransactionDetails::Charge(details) => DisplayFields::Charge {
                payer_name: details.payer_name.clone(),
                payer_cpf: details.payer_document.clone(),
                payment_date: details.payment_date,
            },
            TransactionDetails::Withdrawal(details) => DisplayFields::Withdrawal {
                bank_account: details.bank_account.clone(),
                requested_at: details.requested_at,
                completed_at: details.completed_at,
            },
        };

        Self {
            id: tx.id,
            kind: tx.kind(),
            external_id: tx.external_id.clone(),
            amount: tx.amount,
            status: tx.status,
            settled: is_settled(tx.status),
            fields,
            created_at: tx.created_at,
        }
    }
}

impl From<&Transaction> for TransactionDetail {
    fn from(tx: &Transaction) -> Self {
        Self {
            summary: TransactionSummary::from(tx),
            updated_at: tx.updated_at,
            metadata: tx.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::ChargeDetails;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn charge() -> Transaction {
        Transaction::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "PX1".into(),
            dec!(100.00),
            TransactionDetails::Charge(ChargeDetails {
                payer_name: Some("Alice".into()),
                payer_document: Some("12345678900".into()),
                payment_date: None,
            }),
            json!({"transaction_id": "PX1"}),
        )
    }

    #[test]
    fn test_summary_omits_metadata() {
        let value = serde_json::to_value(TransactionSummary::from(&charge())).unwrap();
        assert_eq!(value["external_id"], "PX1");
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["payer_cpf"], "12345678900");
        assert_eq!(value["settled"], false);
        assert!(value.get("metadata").is_none());
        assert!(value.get("updated_at").is_none());
    }

    #[test]
    fn test_detail_includes_metadata() {
        let value = serde_json::to_value(TransactionDetail::from(&charge())).unwrap();
        assert_eq!(value["metadata"]["provider_response"]["transaction_id"], "PX1");
        assert!(value.get("updated_at").is_some());
        assert_eq!(value["kind"], "CHARGE");
    }
}
