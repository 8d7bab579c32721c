use anyhow::Context;
use axum::{routing::get, Router};
use http::HeaderName;
use pixhub_backend::api::health::{health_check, HealthState};
use pixhub_backend::config::{Config, ProviderCatalog};
use pixhub_backend::database::provider_repository::ProviderRepository;
use pixhub_backend::database::repository::WebhookEventLog;
use pixhub_backend::database::transaction_repository::TransactionRepository;
use pixhub_backend::database::webhook_repository::WebhookRepository;
use pixhub_backend::database::{init_pool, run_migrations, PoolConfig};
use pixhub_backend::jobs::{WebhookJob, WebhookQueue, WebhookWorker};
use pixhub_backend::payments::types::TransactionKind;
use pixhub_backend::payments::{HttpTransport, ProviderDeps, ProviderRegistry};
use pixhub_backend::reconciliation::TransactionStateEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PENDING_REPLAY_LIMIT: i64 = 500;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pixhub_backend=debug"));

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn seed_providers(repo: &ProviderRepository, path: &str) -> anyhow::Result<()> {
    let catalog = match ProviderCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(path, error = %e, "Provider catalog not loaded, keeping stored providers");
            return Ok(());
        }
    };

    for provider in catalog.into_provider_configs() {
        repo.upsert(&provider)
            .await
            .with_context(|| format!("Failed to seed provider {}", provider.name))?;
    }
    Ok(())
}

/// Requeue events a previous process accepted but never finished
async fn replay_pending(
    events: &WebhookRepository,
    providers: &ProviderRepository,
    queue: &WebhookQueue,
) -> anyhow::Result<()> {
    let pending = events.get_pending_events(PENDING_REPLAY_LIMIT).await?;
    if pending.is_empty() {
        return Ok(());
    }
    info!(count = pending.len(), "Replaying pending webhook events");

    for event in pending {
        let Some(kind) = TransactionKind::from_tag(&event.event_type) else {
            warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "Unknown event type, dead-lettering"
            );
            events.mark_dead_lettered(event.id, "unknown event type").await?;
            continue;
        };
        let Some(provider) = providers.find_by_name(&event.source).await? else {
            warn!(
                event_id = %event.id,
                source = %event.source,
                "Provider no longer exists, dead-lettering"
            );
            events.mark_dead_lettered(event.id, "provider not found").await?;
            continue;
        };

        queue
            .enqueue(WebhookJob {
                id: event.id,
                provider,
                kind,
                payload: event.payload,
            })
            .await?;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    info!(
        environment = %config.server.environment,
        terminal_policy = ?config.terminal_policy(),
        simulation = config.simulation.enabled,
        "Starting PIX hub worker"
    );

    let pool = init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await?;
    run_migrations(&pool).await?;

    let providers = ProviderRepository::new(pool.clone());
    seed_providers(&providers, &config.providers_file).await?;

    let engine = Arc::new(TransactionStateEngine::new(
        Arc::new(TransactionRepository::new(pool.clone())),
        config.terminal_policy(),
    ));
    let transport = HttpTransport::new(config.transport_config())
        .context("Failed to build provider HTTP client")?;
    let registry = Arc::new(ProviderRegistry::with_defaults(ProviderDeps {
        transport,
        engine,
    }));

    let events = Arc::new(WebhookRepository::new(pool.clone()));
    let worker_config = config.worker_config();
    let (queue, receiver) = WebhookQueue::channel(worker_config.queue_capacity);
    let worker = WebhookWorker::new(registry.clone(), events.clone(), worker_config)
        .spawn(receiver);

    replay_pending(&events, &providers, &queue).await?;

    let state = HealthState {
        environment: config.server.environment.clone(),
        registry,
        pool: Some(pool),
    };

    let request_id = HeaderName::from_static("x-request-id");
    let app = Router::new()
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Closing the queue lets the worker drain in-flight jobs and stop
    drop(queue);
    worker.await.context("Webhook worker panicked")?;

    info!("Shutdown complete");
    Ok(())
}
