//! Application error type
//!
//! Every failure that crosses the adapter boundary is an [`AppError`] whose
//! [`AppErrorKind`] carries a fixed, typed context payload.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::payments::types::TransactionKind;

/// Result alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum AppErrorKind {
    /// No registered, active adapter matches the configured provider
    #[error("provider '{provider}' not available: {reason}")]
    ProviderNotFound { provider: String, reason: String },

    /// Outbound call returned non-2xx or failed at the transport level
    #[error("{operation} call to provider '{provider}' at {url} failed: {message}")]
    ProviderCallFailed {
        provider: String,
        operation: String,
        url: String,
        status: Option<u16>,
        body: Option<Value>,
        message: String,
    },

    /// Canonical request is malformed
    #[error("invalid field '{field}': {message}")]
    ValidationFailed { field: String, message: String },

    /// Webhook payload shape cannot be interpreted at all
    #[error("cannot normalize {kind} webhook from '{provider}': {reason}")]
    NormalizationFailed {
        provider: String,
        kind: TransactionKind,
        reason: String,
    },

    /// Lookup or persistence failure while applying a webhook
    #[error("{kind} webhook from '{provider}' failed: {message}")]
    WebhookProcessingFailed {
        provider: String,
        kind: TransactionKind,
        identifier: Option<String>,
        message: String,
        payload_excerpt: String,
    },

    /// Storage failure outside webhook application
    #[error("persistence failure: {message}")]
    Persistence { message: String, retryable: bool },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn provider_not_found(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::ProviderNotFound {
            provider: provider.into(),
            reason: reason.into(),
        })
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::ValidationFailed {
            field: field.into(),
            message: message.into(),
        })
    }

    pub fn normalization(
        provider: impl Into<String>,
        kind: TransactionKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(AppErrorKind::NormalizationFailed {
            provider: provider.into(),
            kind,
            reason: reason.into(),
        })
    }

    /// Stable machine-readable code exposed to callers
    pub fn error_code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::ProviderNotFound { .. } => "PROVIDER_NOT_FOUND",
            AppErrorKind::ProviderCallFailed { .. } => "PROVIDER_CALL_FAILED",
            AppErrorKind::ValidationFailed { .. } => "VALIDATION_FAILED",
            AppErrorKind::NormalizationFailed { .. } => "NORMALIZATION_FAILED",
            AppErrorKind::WebhookProcessingFailed { .. } => "WEBHOOK_PROCESSING_FAILED",
            AppErrorKind::Persistence { .. } => "PERSISTENCE_FAILED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            AppErrorKind::ProviderCallFailed { .. } => StatusCode::BAD_GATEWAY,
            AppErrorKind::ValidationFailed { .. } | AppErrorKind::NormalizationFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppErrorKind::WebhookProcessingFailed { .. } | AppErrorKind::Persistence { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::WebhookProcessingFailed { .. } => true,
            AppErrorKind::Persistence { retryable, .. } => *retryable,
            AppErrorKind::ProviderCallFailed { status, .. } => {
                status.map_or(true, |code| code >= 500)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{} ({})", self.kind, context),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AppError {}

impl From<AppErrorKind> for AppError {
    fn from(kind: AppErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Truncates a payload for inclusion in error context
pub fn payload_excerpt(payload: &Value) -> String {
    const MAX: usize = 512;
    let rendered = payload.to_string();
    if rendered.len() <= MAX {
        return rendered;
    }
    let mut end = MAX;
    while !rendered.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &rendered[..end])
}
