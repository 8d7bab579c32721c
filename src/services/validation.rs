//! Preconditions on canonical requests

use crate::error::{AppError, AppResult};
use crate::payments::types::{BankAccount, ChargeRequest, WithdrawalRequest};
use rust_decimal::Decimal;

const MAX_HOLDER_NAME: usize = 255;

pub fn validate_amount(amount: &Decimal) -> AppResult<()> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(AppError::validation("amount", "must be greater than zero"));
    }
    if amount.normalize().scale() > 2 {
        return Err(AppError::validation("amount", "must have at most 2 decimal places"));
    }
    Ok(())
}

fn validate_cpf(field: &str, document: &str) -> AppResult<()> {
    if document.len() != 11 || !document.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(field, "must be 11 digits"));
    }
    Ok(())
}

pub fn validate_charge(request: &ChargeRequest) -> AppResult<()> {
    validate_amount(&request.amount)?;
    if let Some(document) = &request.payer_document {
        validate_cpf("payer_cpf", document)?;
    }
    Ok(())
}

pub fn validate_bank_account(account: &BankAccount) -> AppResult<()> {
    for (field, value) in [
        ("bank_account.bank_code", &account.bank_code),
        ("bank_account.agency", &account.agency),
        ("bank_account.account", &account.account),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation(field, "is required"));
        }
    }
    if let Some(name) = &account.holder_name {
        if name.chars().count() > MAX_HOLDER_NAME {
            return Err(AppError::validation(
                "bank_account.holder_name",
                format!("must be at most {} characters", MAX_HOLDER_NAME),
            ));
        }
    }
    Ok(())
}

pub fn validate_withdrawal(request: &WithdrawalRequest) -> AppResult<()> {
    validate_amount(&request.amount)?;
    validate_bank_account(&request.bank_account)
}
