//! SubadqA adapter

pub mod requests;
pub mod webhook;

use crate::error::AppResult;
use crate::payments::builder::RequestBuilder;
use crate::payments::registry::ProviderDeps;
use crate::payments::traits::PaymentProvider;
use crate::payments::transport::HttpTransport;
use crate::payments::types::{
    ChargeRequest, NormalizedEvent, ProviderConfig, ProviderResponse, Transaction,
    TransactionKind, WithdrawalRequest,
};
use crate::reconciliation::engine::TransactionStateEngine;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use self::requests::{CreatePixRequest, CreateWithdrawRequest};

pub struct SubadqA {
    config: ProviderConfig,
    transport: HttpTransport,
    engine: Arc<TransactionStateEngine>,
}

impl SubadqA {
    pub fn new(config: ProviderConfig, deps: ProviderDeps) -> Self {
        Self {
            config,
            transport: deps.transport,
            engine: deps.engine,
        }
    }
}

#[async_trait]
impl PaymentProvider for SubadqA {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn engine(&self) -> &TransactionStateEngine {
        &self.engine
    }

    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ProviderResponse> {
        info!(provider = self.name(), amount = %request.amount, "Creating PIX charge");
        let outbound = CreatePixRequest.outbound(&self.config, request);
        self.transport
            .execute(self.name(), "create_charge", &self.config.base_url, &outbound)
            .await
    }

    async fn create_withdrawal(&self, request: &WithdrawalRequest) -> AppResult<ProviderResponse> {
        info!(provider = self.name(), amount = %request.amount, "Creating withdrawal");
        let outbound = CreateWithdrawRequest.outbound(&self.config, request);
        self.transport
            .execute(self.name(), "create_withdrawal", &self.config.base_url, &outbound)
            .await
    }

    fn normalize_webhook(
        &self,
        payload: &Value,
        kind: TransactionKind,
    ) -> AppResult<NormalizedEvent> {
        webhook::normalize(payload, kind)
    }

    fn simulated_webhook(&self, transaction: &Transaction) -> Value {
        webhook::simulated_payload(transaction)
    }
}
