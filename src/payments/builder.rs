//! Request builder contract shared by provider dialects

use crate::payments::transport::OutboundRequest;
use crate::payments::types::{AccountType, BankAccount, ProviderConfig};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Pure mapping from a canonical request to one provider operation
pub trait RequestBuilder {
    type Request;

    /// Resource path relative to the provider base URL
    fn resource(&self) -> &'static str;

    /// Mock response marker sent when the provider config asks for one
    fn mock_response_name(&self) -> Option<&'static str> {
        None
    }

    /// Provider payload for `request`; no I/O, no validation
    fn build(&self, config: &ProviderConfig, request: &Self::Request) -> Value;

    fn headers(&self, config: &ProviderConfig) -> HashMap<String, String> {
        let mut headers = HashMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]);
        // Header names are case-insensitive; a configured name replaces the default
        for (name, value) in config.headers() {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
            headers.insert(name, value);
        }

        if let (Some(header), Some(name)) =
            (config.mock_response_header(), self.mock_response_name())
        {
            headers.insert(header.to_string(), name.to_string());
        }
        headers
    }

    fn outbound(&self, config: &ProviderConfig, request: &Self::Request) -> OutboundRequest {
        OutboundRequest {
            method: Method::POST,
            resource: self.resource().to_string(),
            body: Some(self.build(config, request)),
            headers: self.headers(config),
        }
    }
}

/// Bank account as a JSON object, optional holder fields omitted when absent
pub fn bank_account_json(account: &BankAccount) -> Value {
    let mut object = Map::new();
    object.insert("bank_code".into(), json!(account.bank_code));
    object.insert("agency".into(), json!(account.agency));
    object.insert("account".into(), json!(account.account));
    object.insert(
        "account_type".into(),
        json!(match account.account_type {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
        }),
    );
    if let Some(name) = &account.holder_name {
        object.insert("holder_name".into(), json!(name));
    }
    if let Some(document) = &account.holder_document {
        object.insert("holder_document".into(), json!(document));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SampleBuilder;

    impl RequestBuilder for SampleBuilder {
        type Request = ();

        fn resource(&self) -> &'static str {
            "/sample"
        }

        fn mock_response_name(&self) -> Option<&'static str> {
            Some("SAMPLE_OK")
        }

        fn build(&self, _config: &ProviderConfig, _request: &()) -> Value {
            json!({})
        }
    }

    #[test]
    fn test_default_headers_without_config() {
        let config = ProviderConfig::new("Sample", "http://sample", json!({}));
        let headers = SampleBuilder.headers(&config);
        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["Accept"], "application/json");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_configured_headers_and_mock_marker() {
        let config = ProviderConfig::new(
            "Sample",
            "http://sample",
            json!({
                "headers": {"Content-Type": "application/vnd+json", "Authorization": "Bearer k"},
                "mock_response_header": "x-mock-response-name"
            }),
        );
        let headers = SampleBuilder.headers(&config);
        assert_eq!(headers["Content-Type"], "application/vnd+json");
        assert_eq!(headers["Authorization"], "Bearer k");
        assert_eq!(headers["x-mock-response-name"], "SAMPLE_OK");
    }

    #[test]
    fn test_configured_header_replaces_default_ignoring_case() {
        let config = ProviderConfig::new(
            "Sample",
            "http://sample",
            json!({"headers": {"content-type": "text/plain"}}),
        );
        let headers = SampleBuilder.headers(&config);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["content-type"], "text/plain");
        assert!(!headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_outbound_is_post_to_resource() {
        let config = ProviderConfig::new("Sample", "http://sample", json!({}));
        let outbound = SampleBuilder.outbound(&config, &());
        assert_eq!(outbound.method, Method::POST);
        assert_eq!(outbound.resource, "/sample");
        assert_eq!(outbound.body, Some(json!({})));
    }

    #[test]
    fn test_bank_account_json_omits_missing_holder() {
        let account = BankAccount {
            bank_code: "001".into(),
            agency: "1234".into(),
            account: "56789-0".into(),
            account_type: AccountType::Savings,
            holder_name: None,
            holder_document: Some("12345678900".into()),
        };
        assert_eq!(
            bank_account_json(&account),
            json!({
                "bank_code": "001",
                "agency": "1234",
                "account": "56789-0",
                "account_type": "SAVINGS",
                "holder_document": "12345678900"
            })
        );
    }
}
