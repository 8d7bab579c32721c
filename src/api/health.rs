use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::payments::ProviderRegistry;

#[derive(Clone)]
pub struct HealthState {
    pub environment: String,
    pub registry: Arc<ProviderRegistry>,
    #[cfg(feature = "database")]
    pub pool: Option<sqlx::PgPool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub providers: Vec<String>,
    pub database: String,
}

#[cfg(feature = "database")]
async fn database_status(state: &HealthState) -> &'static str {
    match &state.pool {
        Some(pool) => match crate::database::health_check(pool).await {
            Ok(()) => "up",
            Err(_) => "down",
        },
        None => "disabled",
    }
}

#[cfg(not(feature = "database"))]
async fn database_status(_state: &HealthState) -> &'static str {
    "disabled"
}

pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_status(&state).await;
    let (code, status) = if database == "down" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "healthy")
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        providers: state.registry.registered_names(),
        database: database.to_string(),
    };

    (code, Json(response))
}
