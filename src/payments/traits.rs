//! Provider capability contract
//!
//! Defines the interface every shipped sub-acquirer adapter implements.

use crate::error::{payload_excerpt, AppError, AppErrorKind, AppResult};
use crate::payments::types::{
    ChargeRequest, NormalizedEvent, ProviderConfig, ProviderResponse, Transaction,
    TransactionKind, WithdrawalRequest,
};
use crate::reconciliation::engine::{ApplyOutcome, TransactionStateEngine};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// Trait for sub-acquirer adapters
///
/// Each provider composes its pure request builders and webhook normalizer
/// with the shared outbound transport and the state engine.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name as configured
    fn name(&self) -> &str;

    /// Configuration the adapter was resolved from
    fn config(&self) -> &ProviderConfig;

    /// State engine webhook events are applied through
    fn engine(&self) -> &TransactionStateEngine;

    /// Create a PIX charge with the provider
    ///
    /// # Arguments
    /// * `request` - Canonical charge request, already validated
    ///
    /// # Returns
    /// * `ProviderResponse` - HTTP status and decoded body; any non-2xx or
    ///   transport failure is `ProviderCallFailed`
    async fn create_charge(&self, request: &ChargeRequest) -> AppResult<ProviderResponse>;

    /// Create a bank withdrawal with the provider
    ///
    /// # Arguments
    /// * `request` - Canonical withdrawal request with a structurally valid bank account
    ///
    /// # Returns
    /// * `ProviderResponse` - HTTP status and decoded body
    async fn create_withdrawal(&self, request: &WithdrawalRequest) -> AppResult<ProviderResponse>;

    /// Translate a raw webhook payload into the canonical event shape
    ///
    /// Fails with `NormalizationFailed` only when the payload is not an object.
    fn normalize_webhook(&self, payload: &Value, kind: TransactionKind)
        -> AppResult<NormalizedEvent>;

    /// Payload shaped like this provider's webhook confirming `transaction`
    fn simulated_webhook(&self, transaction: &Transaction) -> Value;

    /// Normalize a webhook and apply it to the matching transaction
    ///
    /// Normalization and persistence failures surface as `WebhookProcessingFailed`;
    /// an unknown transaction is [`ApplyOutcome::NotFound`], not an error.
    async fn ingest_webhook(
        &self,
        payload: &Value,
        kind: TransactionKind,
    ) -> AppResult<ApplyOutcome> {
        let event = self.normalize_webhook(payload, kind).map_err(|e| {
            warn!(provider = self.name(), kind = %kind, error = %e, "Webhook normalization failed");
            AppError::new(AppErrorKind::WebhookProcessingFailed {
                provider: self.name().to_string(),
                kind,
                identifier: None,
                message: e.to_string(),
                payload_excerpt: payload_excerpt(payload),
            })
        })?;

        debug!(
            provider = self.name(),
            kind = %kind,
            external_id = ?event.external_id,
            status = ?event.status,
            "Webhook normalized"
        );

        self.engine().apply(self.name(), &event).await
    }

    /// Verify an HMAC-SHA256 hex signature over the raw webhook body
    ///
    /// # Returns
    /// * `bool` - False when no `webhook_secret` is configured or the digest differs
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Some(secret) = self.config().webhook_secret() else {
            return false;
        };
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }
}

/// Hex HMAC-SHA256 of `payload`, the format expected by signature validation
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}
