//! Charge and withdrawal creation
//!
//! Resolves the owner's provider, calls it, and persists the acknowledged
//! transaction as `PENDING`. A failed provider call writes nothing.

use crate::error::AppResult;
use crate::payments::builder::bank_account_json;
use crate::payments::external_id::extract_external_id;
use crate::payments::registry::ProviderRegistry;
use crate::payments::simulation::SimulationDriver;
use crate::payments::types::{
    ChargeDetails, ChargeRequest, ProviderConfig, ProviderResponse, Transaction,
    TransactionDetails, TransactionKind, WithdrawalDetails, WithdrawalRequest,
};
use crate::services::validation::{validate_charge, validate_withdrawal};
use crate::services::views::{TransactionDetail, TransactionSummary};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 15;

pub struct TransactionService {
    registry: Arc<ProviderRegistry>,
    simulation: Option<SimulationDriver>,
}

impl TransactionService {
    pub fn new(registry: Arc<ProviderRegistry>, simulation: Option<SimulationDriver>) -> Self {
        Self {
            registry,
            simulation,
        }
    }

    /// Create a PIX charge for `owner_id` through its configured provider
    pub async fn create_charge(
        &self,
        owner_id: Uuid,
        provider: Option<&ProviderConfig>,
        request: ChargeRequest,
    ) -> AppResult<Transaction> {
        let adapter = self.registry.resolve_for_owner(provider)?;
        validate_charge(&request)?;

        let response = adapter.create_charge(&request).await.map_err(|e| {
            error!(
                provider = adapter.name(),
                owner_id = %owner_id,
                error = %e,
                "PIX charge creation failed"
            );
            e.with_context("create_charge")
        })?;

        let details = TransactionDetails::Charge(ChargeDetails {
            payer_name: request.payer_name.clone(),
            payer_document: request.payer_document.clone(),
            payment_date: None,
        });

        self.persist(owner_id, adapter.config(), request.amount, details, response)
            .await
    }

    /// Create a bank withdrawal for `owner_id` through its configured provider
    pub async fn create_withdrawal(
        &self,
        owner_id: Uuid,
        provider: Option<&ProviderConfig>,
        request: WithdrawalRequest,
    ) -> AppResult<Transaction> {
        let adapter = self.registry.resolve_for_owner(provider)?;
        validate_withdrawal(&request)?;

        let response = adapter.create_withdrawal(&request).await.map_err(|e| {
            error!(
                provider = adapter.name(),
                owner_id = %owner_id,
                error = %e,
                "Withdrawal creation failed"
            );
            e.with_context("create_withdrawal")
        })?;

        let details = TransactionDetails::Withdrawal(WithdrawalDetails {
            bank_account: Some(bank_account_json(&request.bank_account)),
            requested_at: Some(Utc::now()),
            completed_at: None,
        });

        self.persist(owner_id, adapter.config(), request.amount, details, response)
            .await
    }

    async fn persist(
        &self,
        owner_id: Uuid,
        provider: &ProviderConfig,
        amount: Decimal,
        details: TransactionDetails,
        response: ProviderResponse,
    ) -> AppResult<Transaction> {
        let kind = details.kind();
        let external_id = extract_external_id(&response.body, kind, &provider.name);
        let transaction = Transaction::pending(
            owner_id,
            provider.id,
            external_id,
            amount,
            details,
            response.body,
        );

        let stored = self.registry.engine().store().insert(&transaction).await?;

        info!(
            provider = %provider.name,
            kind = %kind,
            transaction_id = %stored.id,
            external_id = ?stored.external_id,
            "Transaction created"
        );

        match &self.simulation {
            Some(driver) if driver.is_enabled() => {
                driver.schedule(&stored, provider.clone());
            }
            Some(_) => {}
            None => debug!(
                transaction_id = %stored.id,
                "No simulation driver, waiting for provider webhook"
            ),
        }

        Ok(stored)
    }

    pub async fn get(
        &self,
        kind: TransactionKind,
        id: Uuid,
    ) -> AppResult<Option<TransactionDetail>> {
        let found = self.registry.engine().store().find_by_id(kind, id).await?;
        Ok(found.as_ref().map(TransactionDetail::from))
    }

    /// Owner's transactions, newest first; `page` starts at 1
    pub async fn list_for_owner(
        &self,
        kind: TransactionKind,
        owner_id: Uuid,
        page: i64,
        per_page: Option<i64>,
    ) -> AppResult<Vec<TransactionSummary>> {
        let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
        let offset = (page.max(1) - 1) * per_page;
        let transactions = self
            .registry
            .engine()
            .store()
            .list_by_owner(kind, owner_id, per_page, offset)
            .await?;
        Ok(transactions.iter().map(TransactionSummary::from).collect())
    }
}
