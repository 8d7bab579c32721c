pub mod error;
pub mod memory;
pub mod repository;

// Postgres storage requires the `database` feature
#[cfg(feature = "database")]
pub mod provider_repository;
#[cfg(feature = "database")]
pub mod transaction_repository;
#[cfg(feature = "database")]
pub mod webhook_repository;

#[cfg(feature = "database")]
pub use postgres::*;

#[cfg(feature = "database")]
mod postgres {
    use sqlx::postgres::PgPoolOptions;
    use sqlx::PgPool;
    use std::time::Duration;
    use tracing::{error as log_error, info, warn};

    use super::error::DatabaseError;

    /// Database pool configuration
    #[derive(Debug, Clone)]
    pub struct PoolConfig {
        pub max_connections: u32,
        pub min_connections: u32,
        pub connection_timeout: Duration,
        pub idle_timeout: Duration,
        pub max_lifetime: Duration,
    }

    impl Default for PoolConfig {
        fn default() -> Self {
            Self {
                max_connections: 20,
                min_connections: 5,
                connection_timeout: Duration::from_secs(30),
                idle_timeout: Duration::from_secs(600),
                max_lifetime: Duration::from_secs(1800),
            }
        }
    }

    /// Initialize the database connection pool
    pub async fn init_pool(
        database_url: &str,
        config: Option<PoolConfig>,
    ) -> Result<PgPool, DatabaseError> {
        let config = config.unwrap_or_default();

        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connection_timeout = ?config.connection_timeout,
            "Initializing database pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connection_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| {
                log_error!("Failed to initialize database pool: {}", e);
                DatabaseError::from_sqlx(e)
            })?;

        // Test the connection
        pool.acquire().await.map_err(|e| {
            log_error!("Failed to acquire test connection: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

        info!("Database pool initialized successfully");
        Ok(pool)
    }

    /// Apply the bundled schema migrations
    pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
            log_error!("Migration failed: {}", e);
            DatabaseError::from_sqlx(e.into())
        })?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Connection pool health check
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| {
                warn!("Health check failed: {}", e);
                DatabaseError::from_sqlx(e)
            })?;

        Ok(())
    }

}
