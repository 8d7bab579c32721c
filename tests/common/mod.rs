#![allow(dead_code)]

use pixhub_backend::database::memory::{InMemoryTransactionStore, InMemoryWebhookEventLog};
use pixhub_backend::payments::types::{
    ChargeDetails, ProviderConfig, Transaction, TransactionDetails, TransactionKind,
};
use pixhub_backend::payments::{HttpTransport, ProviderDeps, ProviderRegistry, TransportConfig};
use pixhub_backend::reconciliation::{TerminalPolicy, TransactionStateEngine};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemoryTransactionStore>,
    pub events: Arc<InMemoryWebhookEventLog>,
    pub registry: Arc<ProviderRegistry>,
}

pub fn harness(policy: TerminalPolicy) -> Harness {
    let store = Arc::new(InMemoryTransactionStore::new());
    let engine = Arc::new(TransactionStateEngine::new(store.clone(), policy));
    let transport = HttpTransport::new(TransportConfig {
        timeout: Duration::from_secs(5),
        max_retries: 0,
        backoff_base: Duration::from_millis(1),
        backoff_cap: Duration::from_millis(1),
    })
    .expect("http client");

    Harness {
        store,
        events: Arc::new(InMemoryWebhookEventLog::new()),
        registry: Arc::new(ProviderRegistry::with_defaults(ProviderDeps {
            transport,
            engine,
        })),
    }
}

pub fn provider(name: &str, base_url: &str) -> ProviderConfig {
    ProviderConfig::new(
        name,
        base_url,
        json!({
            "headers": {"Content-Type": "application/json"},
            "mock_response_header": "x-mock-response-name",
            "seller_id": "seller-001"
        }),
    )
}

pub fn pending_charge(
    provider: &ProviderConfig,
    external_id: &str,
    amount: Decimal,
) -> Transaction {
    Transaction::pending(
        Uuid::new_v4(),
        provider.id,
        external_id.to_string(),
        amount,
        TransactionDetails::Charge(ChargeDetails::default()),
        json!({"id": external_id}),
    )
}

pub fn pending_withdrawal(
    provider: &ProviderConfig,
    external_id: &str,
    amount: Decimal,
) -> Transaction {
    Transaction::pending(
        Uuid::new_v4(),
        provider.id,
        external_id.to_string(),
        amount,
        TransactionDetails::empty(TransactionKind::Withdrawal),
        json!({"withdraw_id": external_id}),
    )
}
