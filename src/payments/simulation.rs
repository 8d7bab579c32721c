//! Simulated provider webhooks
//!
//! Emits provider-shaped payloads after a random delay so the normalizers
//! and the state engine run end-to-end without a live provider. Simulated
//! payloads are queued as ordinary webhook jobs, so they get the same retry
//! bound and event log as real deliveries and race them under the same
//! per-key lock.

use crate::error::{payload_excerpt, AppError, AppErrorKind, AppResult};
use crate::jobs::{WebhookJob, WebhookQueue};
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{ProviderConfig, Transaction, TransactionKind, TransactionStatus};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    /// Payload handed to the webhook queue as job `job_id`
    Queued { job_id: Uuid },
    /// Transaction vanished or already left `PENDING`
    Skipped { status: Option<TransactionStatus> },
}

#[derive(Clone)]
pub struct SimulationDriver {
    registry: Arc<ProviderRegistry>,
    queue: WebhookQueue,
    config: SimulationConfig,
}

impl SimulationDriver {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        queue: WebhookQueue,
        config: SimulationConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Uniform delay within the configured bounds
    pub fn random_delay(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = (self.config.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Queue a simulated webhook for `transaction` after a random delay
    pub fn schedule(&self, transaction: &Transaction, provider: ProviderConfig) -> JoinHandle<()> {
        let driver = self.clone();
        let delay = self.random_delay();
        let kind = transaction.kind();
        let id = transaction.id;

        info!(
            provider = %provider.name,
            kind = %kind,
            transaction_id = %id,
            delay_ms = delay.as_millis() as u64,
            "Scheduling simulated webhook"
        );

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match driver.deliver(kind, id, &provider).await {
                Ok(outcome) => {
                    debug!(transaction_id = %id, outcome = ?outcome, "Simulated webhook finished")
                }
                Err(e) => error!(
                    provider = %provider.name,
                    transaction_id = %id,
                    error = %e,
                    "Simulated webhook failed"
                ),
            }
        })
    }

    /// Queue a simulated webhook now, unless the transaction is no longer `PENDING`
    pub async fn deliver(
        &self,
        kind: TransactionKind,
        id: Uuid,
        provider: &ProviderConfig,
    ) -> AppResult<SimulationOutcome> {
        let current = self.registry.engine().store().find_by_id(kind, id).await?;

        let transaction = match current {
            Some(tx) if tx.status == TransactionStatus::Pending => tx,
            other => {
                let status = other.map(|tx| tx.status);
                info!(
                    transaction_id = %id,
                    status = ?status,
                    "Skipping simulated webhook, transaction is not pending"
                );
                return Ok(SimulationOutcome::Skipped { status });
            }
        };

        let adapter = self.registry.resolve(provider)?;
        let payload = adapter.simulated_webhook(&transaction);
        info!(
            provider = adapter.name(),
            kind = %kind,
            transaction_id = %id,
            "Queueing simulated webhook"
        );

        let excerpt = payload_excerpt(&payload);
        let job = WebhookJob::new(adapter.config().clone(), kind, payload);
        let job_id = self.queue.enqueue(job).await.map_err(|e| {
            AppError::new(AppErrorKind::WebhookProcessingFailed {
                provider: provider.name.clone(),
                kind,
                identifier: transaction.external_id.clone(),
                message: e.to_string(),
                payload_excerpt: excerpt,
            })
        })?;
        Ok(SimulationOutcome::Queued { job_id })
    }
}
