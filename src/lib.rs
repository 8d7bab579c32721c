//! PIX charge and withdrawal processing over interchangeable sub-acquirers
//!
//! Providers are resolved at runtime from stored configuration, outbound
//! calls share one HTTP transport, and asynchronous provider webhooks are
//! normalized into a single event shape before being reconciled against
//! stored transactions.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod payments;
pub mod reconciliation;
pub mod services;

pub use error::{AppError, AppErrorKind, AppResult};
