//! Webhook reconciliation
//!
//! Applies normalized provider events to stored transactions.

pub mod engine;
pub mod transition;

pub use engine::{ApplyOutcome, TransactionStateEngine};
pub use transition::TerminalPolicy;
