//! Webhook ingestion jobs
//!
//! Each inbound webhook becomes a [`WebhookJob`] on a bounded queue. Workers
//! retry a failing job up to `max_attempts` times, each attempt under a
//! timeout, and dead-letter it in the event log once the bound is reached.

use crate::database::repository::WebhookEventLog;
use crate::error::AppResult;
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::{ProviderConfig, TransactionKind, TransactionStatus};
use crate::reconciliation::engine::ApplyOutcome;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub retry_delay: Duration,
    pub concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(1),
            concurrency: 8,
            queue_capacity: 1024,
        }
    }
}

/// One inbound webhook, already routed to its provider
#[derive(Debug, Clone)]
pub struct WebhookJob {
    pub id: Uuid,
    pub provider: ProviderConfig,
    pub kind: TransactionKind,
    pub payload: Value,
}

impl WebhookJob {
    pub fn new(provider: ProviderConfig, kind: TransactionKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider,
            kind,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Applied {
        transaction_id: Uuid,
        status: TransactionStatus,
    },
    /// No matching transaction; completed without retry
    NotFound,
    DeadLettered {
        attempts: u32,
        error: String,
    },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("webhook queue is closed")]
    Closed,
    #[error("webhook queue is full")]
    Full,
}

/// Producer side of the webhook queue
#[derive(Clone)]
pub struct WebhookQueue {
    sender: mpsc::Sender<WebhookJob>,
}

impl WebhookQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WebhookJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue without waiting for capacity
    pub fn try_enqueue(&self, job: WebhookJob) -> Result<Uuid, QueueError> {
        let id = job.id;
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })?;
        Ok(id)
    }

    pub async fn enqueue(&self, job: WebhookJob) -> Result<Uuid, QueueError> {
        let id = job.id;
        self.sender.send(job).await.map_err(|_| QueueError::Closed)?;
        Ok(id)
    }
}

#[derive(Clone)]
pub struct WebhookWorker {
    registry: Arc<ProviderRegistry>,
    events: Arc<dyn WebhookEventLog>,
    config: WorkerConfig,
}

impl WebhookWorker {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        events: Arc<dyn WebhookEventLog>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            registry,
            events,
            config,
        }
    }

    /// Run `job` to completion: applied, not found, or dead-lettered
    pub async fn process(&self, job: &WebhookJob) -> JobOutcome {
        if let Err(e) = self
            .events
            .log_event(job.id, job.kind, &job.provider.name, &job.payload)
            .await
        {
            warn!(job_id = %job.id, error = %e, "Failed to log webhook event");
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(self.config.attempt_timeout, self.attempt(job)).await {
                Ok(Ok(outcome)) => {
                    if let Err(e) = self.events.mark_processed(job.id).await {
                        warn!(job_id = %job.id, error = %e, "Failed to mark webhook processed");
                    }
                    return match outcome {
                        ApplyOutcome::Updated { transaction, .. } => JobOutcome::Applied {
                            transaction_id: transaction.id,
                            status: transaction.status,
                        },
                        ApplyOutcome::NotFound { identifier } => {
                            info!(
                                job_id = %job.id,
                                provider = %job.provider.name,
                                identifier = ?identifier,
                                "Webhook matched no transaction, completing"
                            );
                            JobOutcome::NotFound
                        }
                    };
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error =
                        format!("attempt timed out after {:?}", self.config.attempt_timeout)
                }
            }

            warn!(
                job_id = %job.id,
                provider = %job.provider.name,
                kind = %job.kind,
                attempt,
                max_attempts,
                error = %last_error,
                "Webhook attempt failed"
            );
            if let Err(e) = self.events.record_failure(job.id, &last_error).await {
                warn!(job_id = %job.id, error = %e, "Failed to record webhook failure");
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!(
            job_id = %job.id,
            provider = %job.provider.name,
            kind = %job.kind,
            attempts = max_attempts,
            error = %last_error,
            "Webhook failed after all attempts, dead-lettering"
        );
        if let Err(e) = self.events.mark_dead_lettered(job.id, &last_error).await {
            error!(job_id = %job.id, error = %e, "Failed to dead-letter webhook event");
        }

        JobOutcome::DeadLettered {
            attempts: max_attempts,
            error: last_error,
        }
    }

    async fn attempt(&self, job: &WebhookJob) -> AppResult<ApplyOutcome> {
        let adapter = self.registry.resolve(&job.provider)?;
        adapter.ingest_webhook(&job.payload, job.kind).await
    }

    /// Consume `receiver` with at most `concurrency` jobs in flight
    ///
    /// Returns once the queue is closed and in-flight jobs have drained.
    pub fn spawn(self, mut receiver: mpsc::Receiver<WebhookJob>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let concurrency = self.config.concurrency.max(1);
            let semaphore = Arc::new(Semaphore::new(concurrency));
            info!(concurrency, "Webhook worker started");

            while let Some(job) = receiver.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let worker = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    worker.process(&job).await;
                });
            }

            let _ = semaphore.acquire_many(concurrency as u32).await;
            info!("Webhook queue closed, worker stopped");
        })
    }
}
