pub mod transaction_service;
pub mod validation;
pub mod views;

pub use transaction_service::TransactionService;
