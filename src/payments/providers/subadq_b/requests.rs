//! SubadqB request builders: nested payer object, seller/order references

use crate::payments::builder::{bank_account_json, RequestBuilder};
use crate::payments::types::{amount_json, ChargeRequest, ProviderConfig, WithdrawalRequest};
use serde_json::{json, Value};

pub const DEFAULT_EXPIRES_IN: u64 = 3600;

pub struct CreatePixRequest;

impl RequestBuilder for CreatePixRequest {
    type Request = ChargeRequest;

    fn resource(&self) -> &'static str {
        "/pix/create"
    }

    fn mock_response_name(&self) -> Option<&'static str> {
        Some("SUCESSO_PIX")
    }

    fn build(&self, config: &ProviderConfig, request: &ChargeRequest) -> Value {
        let expires_in = config
            .setting("expires_in")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_EXPIRES_IN);

        json!({
            "seller_id": config.setting("seller_id").cloned().unwrap_or(Value::Null),
            "order_id": request.reference,
            "amount": amount_json(&request.amount),
            "payer": {
                "name": request.payer_name,
                "cpf_cnpj": request.payer_document,
            },
            "expires_in": expires_in,
        })
    }
}

pub struct CreateWithdrawRequest;

impl RequestBuilder for CreateWithdrawRequest {
    type Request = WithdrawalRequest;

    fn resource(&self) -> &'static str {
        "/withdraw"
    }

    fn mock_response_name(&self) -> Option<&'static str> {
        Some("[SUCESSO_WD] withdraw")
    }

    fn build(&self, _config: &ProviderConfig, request: &WithdrawalRequest) -> Value {
        json!({
            "amount": amount_json(&request.amount),
            "bank_account": bank_account_json(&request.bank_account),
        })
    }
}
