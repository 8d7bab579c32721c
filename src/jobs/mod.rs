//! Background units of work

pub mod webhook_job;

pub use webhook_job::{JobOutcome, WebhookJob, WebhookQueue, WebhookWorker, WorkerConfig};
