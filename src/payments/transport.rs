//! Outbound HTTP transport shared by all provider adapters

use crate::error::{AppError, AppErrorKind, AppResult};
use crate::payments::types::ProviderResponse;
use reqwest::{Client, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// Transport tuning
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-call timeout
    pub timeout: Duration,
    /// Retries after the first attempt, connection failures only
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff_base: Duration::from_millis(200),
            backoff_cap: Duration::from_secs(2),
        }
    }
}

/// Outbound request as produced by a request builder
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub resource: String,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Joins `resource` to `base_url` unless it is already absolute
    pub fn resolve_url(base_url: &str, resource: &str) -> String {
        if resource.starts_with("http://") || resource.starts_with("https://") {
            return resource.to_string();
        }
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }

    /// Capped exponential backoff before retry number `attempt + 1`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.backoff_cap)
    }

    /// Executes a request built for `provider`, resolving its resource against `base_url`
    pub async fn execute(
        &self,
        provider: &str,
        operation: &str,
        base_url: &str,
        request: &OutboundRequest,
    ) -> AppResult<ProviderResponse> {
        let url = Self::resolve_url(base_url, &request.resource);
        self.send(
            provider,
            operation,
            request.method.clone(),
            &url,
            request.body.as_ref(),
            &request.headers,
        )
        .await
    }

    /// Sends a request, retrying connection-level failures only
    pub async fn send(
        &self,
        provider: &str,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &HashMap<String, String>,
    ) -> AppResult<ProviderResponse> {
        let mut attempt: u32 = 0;

        loop {
            info!(
                provider,
                operation,
                method = %method,
                url,
                headers = ?headers,
                body = ?body,
                attempt = attempt + 1,
                "Sending provider request"
            );

            let mut request = self.client.request(method.clone(), url);
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|e| {
                        error!(provider, url, error = %e, "Failed to read provider response body");
                        call_failed(
                            provider,
                            operation,
                            url,
                            Some(status.as_u16()),
                            None,
                            e.to_string(),
                        )
                    })?;
                    let body = decode_body(&text);

                    info!(
                        provider,
                        operation,
                        url,
                        status = status.as_u16(),
                        body = %body,
                        "Provider response received"
                    );

                    if status.is_success() {
                        return Ok(ProviderResponse {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    error!(
                        provider,
                        operation,
                        url,
                        status = status.as_u16(),
                        "Provider returned an error status"
                    );
                    return Err(call_failed(
                        provider,
                        operation,
                        url,
                        Some(status.as_u16()),
                        Some(body),
                        format!("HTTP {}", status),
                    ));
                }
                Err(e) if e.is_connect() && attempt < self.config.max_retries => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        provider,
                        url,
                        error = %e,
                        "Connection failed, retrying after {:?} (attempt {})",
                        backoff,
                        attempt + 1
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        provider,
                        operation,
                        url,
                        error = %e,
                        attempts = attempt + 1,
                        "Provider request failed"
                    );
                    let message = if e.is_timeout() {
                        format!("timed out after {:?}", self.config.timeout)
                    } else {
                        e.to_string()
                    };
                    return Err(call_failed(provider, operation, url, None, None, message));
                }
            }
        }
    }
}

fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn call_failed(
    provider: &str,
    operation: &str,
    url: &str,
    status: Option<u16>,
    body: Option<Value>,
    message: String,
) -> AppError {
    AppError::new(AppErrorKind::ProviderCallFailed {
        provider: provider.to_string(),
        operation: operation.to_string(),
        url: url.to_string(),
        status,
        body,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fast_transport() -> HttpTransport {
        HttpTransport::new(TransportConfig {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(5),
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_url_joins_with_single_slash() {
        assert_eq!(
            HttpTransport::resolve_url("http://api.test/", "/pix/create"),
            "http://api.test/pix/create"
        );
        assert_eq!(
            HttpTransport::resolve_url("http://api.test", "withdraw"),
            "http://api.test/withdraw"
        );
    }

    #[test]
    fn test_resolve_url_keeps_absolute_resource() {
        assert_eq!(
            HttpTransport::resolve_url("http://api.test", "https://other.test/pix"),
            "https://other.test/pix"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let transport = HttpTransport::new(TransportConfig::default()).unwrap();
        assert_eq!(transport.backoff_for(0), Duration::from_millis(200));
        assert_eq!(transport.backoff_for(1), Duration::from_millis(400));
        assert_eq!(transport.backoff_for(10), Duration::from_secs(2));
    }

    #[test]
    fn test_decode_body_falls_back_to_text() {
        assert_eq!(decode_body(""), Value::Null);
        assert_eq!(decode_body("{\"id\":1}"), json!({"id": 1}));
        assert_eq!(decode_body("oops"), json!("oops"));
    }

    #[tokio::test]
    async fn test_send_returns_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pix/create")
            .match_header("x-test", "1")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transaction_id":"TX1"}"#)
            .create_async()
            .await;

        let transport = fast_transport();
        let headers = HashMap::from([("x-test".to_string(), "1".to_string())]);
        let response = transport
            .send(
                "SubadqA",
                "create_charge",
                Method::POST,
                &format!("{}/pix/create", server.url()),
                Some(&json!({"amount": 10.0})),
                &headers,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 201);
        assert_eq!(response.body["transaction_id"], "TX1");
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/withdraw")
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .expect(1)
            .create_async()
            .await;

        let transport = fast_transport();
        let err = transport
            .send(
                "SubadqB",
                "create_withdrawal",
                Method::POST,
                &format!("{}/withdraw", server.url()),
                None,
                &HashMap::new(),
            )
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err.kind {
            AppErrorKind::ProviderCallFailed { status, body, provider, .. } => {
                assert_eq!(provider, "SubadqB");
                assert_eq!(status, Some(500));
                assert_eq!(body, Some(json!({"error": "boom"})));
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_exhausts_retries() {
        let transport = fast_transport();
        let err = transport
            .send(
                "SubadqA",
                "create_charge",
                Method::POST,
                "http://127.0.0.1:1/pix/create",
                None,
                &HashMap::new(),
            )
            .await
            .unwrap_err();

        match err.kind {
            AppErrorKind::ProviderCallFailed { status, body, .. } => {
                assert_eq!(status, None);
                assert_eq!(body, None);
            }
            other => panic!("unexpected error kind: {:?}", other),
        }
    }
}
