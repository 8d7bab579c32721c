//! SubadqA request builders: flat payloads

use crate::payments::builder::{bank_account_json, RequestBuilder};
use crate::payments::types::{amount_json, ChargeRequest, ProviderConfig, WithdrawalRequest};
use serde_json::{json, Map, Value};

pub const DEFAULT_DESCRIPTION: &str = "Cobrança PIX";

pub struct CreatePixRequest;

impl RequestBuilder for CreatePixRequest {
    type Request = ChargeRequest;

    fn resource(&self) -> &'static str {
        "/pix/create"
    }

    fn mock_response_name(&self) -> Option<&'static str> {
        Some("[SUCESSO_PIX] pix_create")
    }

    fn build(&self, _config: &ProviderConfig, request: &ChargeRequest) -> Value {
        let mut payload = Map::new();
        payload.insert("amount".into(), amount_json(&request.amount));
        if let Some(name) = &request.payer_name {
            payload.insert("payer_name".into(), json!(name));
        }
        if let Some(document) = &request.payer_document {
            payload.insert("payer_cpf".into(), json!(document));
        }
        payload.insert(
            "description".into(),
            json!(request.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION)),
        );
        Value::Object(payload)
    }
}

pub struct CreateWithdrawRequest;

impl RequestBuilder for CreateWithdrawRequest {
    type Request = WithdrawalRequest;

    fn resource(&self) -> &'static str {
        "/withdraw"
    }

    fn mock_response_name(&self) -> Option<&'static str> {
        Some("SUCESSO_WD")
    }

    fn build(&self, _config: &ProviderConfig, request: &WithdrawalRequest) -> Value {
        json!({
            "amount": amount_json(&request.amount),
            "bank_account": bank_account_json(&request.bank_account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{AccountType, BankAccount};
    use rust_decimal_macros::dec;

    fn config() -> ProviderConfig {
        ProviderConfig::new(
            "SubadqA",
            "http://subadq-a.test",
            json!({"mock_response_header": "x-mock-response-name"}),
        )
    }

    #[test]
    fn test_pix_payload_uses_default_description() {
        let request = ChargeRequest {
            amount: dec!(100.00),
            payer_name: Some("Alice".into()),
            payer_document: Some("12345678900".into()),
            description: None,
            reference: None,
        };

        assert_eq!(
            CreatePixRequest.build(&config(), &request),
            json!({
                "amount": 100.00,
                "payer_name": "Alice",
                "payer_cpf": "12345678900",
                "description": "Cobrança PIX"
            })
        );
    }

    #[test]
    fn test_pix_headers_carry_mock_marker() {
        let headers = CreatePixRequest.headers(&config());
        assert_eq!(headers["x-mock-response-name"], "[SUCESSO_PIX] pix_create");
    }

    #[test]
    fn test_withdraw_payload() {
        let request = WithdrawalRequest {
            amount: dec!(250.50),
            bank_account: BankAccount {
                bank_code: "341".into(),
                agency: "0001".into(),
                account: "12345-6".into(),
                account_type: AccountType::Checking,
                holder_name: Some("Alice".into()),
                holder_document: None,
            },
        };

        let outbound = CreateWithdrawRequest.outbound(&config(), &request);
        assert_eq!(outbound.resource, "/withdraw");
        assert_eq!(outbound.headers["x-mock-response-name"], "SUCESSO_WD");
        assert_eq!(
            outbound.body,
            Some(json!({
                "amount": 250.5,
                "bank_account": {
                    "bank_code": "341",
                    "agency": "0001",
                    "account": "12345-6",
                    "account_type": "CHECKING",
                    "holder_name": "Alice"
                }
            }))
        );
    }
}
