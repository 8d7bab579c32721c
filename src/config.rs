use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::jobs::WorkerConfig;
use crate::payments::simulation::SimulationConfig;
use crate::payments::types::ProviderConfig;
use crate::payments::TransportConfig;
use crate::reconciliation::TerminalPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub transport: TransportSettings,
    pub worker: WorkerSettings,
    pub simulation: SimulationSettings,
    pub reconciliation: ReconciliationSettings,
    pub providers_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub max_attempts: u32,
    pub attempt_timeout_secs: u64,
    pub retry_delay_ms: u64,
    pub concurrency: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    pub enabled: bool,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationSettings {
    pub terminal_policy: String,
}

/// Read `key` through `lookup`, falling back to `default` when unset
fn setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid value, got '{}'", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server = ServerConfig {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: setting(&lookup, "PORT", 8000)?,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: setting(&lookup, "DATABASE_MAX_CONNECTIONS", 20)?,
        };

        let transport = TransportSettings {
            timeout_secs: setting(&lookup, "PROVIDER_TIMEOUT_SECS", 30)?,
            max_retries: setting(&lookup, "PROVIDER_MAX_RETRIES", 2)?,
            backoff_base_ms: setting(&lookup, "PROVIDER_BACKOFF_BASE_MS", 200)?,
            backoff_cap_ms: setting(&lookup, "PROVIDER_BACKOFF_CAP_MS", 2000)?,
        };

        let worker = WorkerSettings {
            max_attempts: setting(&lookup, "WEBHOOK_MAX_ATTEMPTS", 3)?,
            attempt_timeout_secs: setting(&lookup, "WEBHOOK_ATTEMPT_TIMEOUT_SECS", 60)?,
            retry_delay_ms: setting(&lookup, "WEBHOOK_RETRY_DELAY_MS", 1000)?,
            concurrency: setting(&lookup, "WEBHOOK_CONCURRENCY", 8)?,
            queue_capacity: setting(&lookup, "WEBHOOK_QUEUE_CAPACITY", 1024)?,
        };

        let simulation = SimulationSettings {
            enabled: setting(&lookup, "SIMULATION_ENABLED", true)?,
            min_delay_secs: setting(&lookup, "SIMULATION_MIN_DELAY_SECS", 2)?,
            max_delay_secs: setting(&lookup, "SIMULATION_MAX_DELAY_SECS", 10)?,
        };

        let reconciliation = ReconciliationSettings {
            terminal_policy: lookup("TERMINAL_POLICY").unwrap_or_else(|| "reject".to_string()),
        };

        let config = Config {
            server,
            database,
            transport,
            worker,
            simulation,
            reconciliation,
            providers_file: lookup("PROVIDERS_FILE")
                .unwrap_or_else(|| "providers.toml".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.worker.max_attempts == 0 {
            return Err(anyhow!("WEBHOOK_MAX_ATTEMPTS must be greater than 0"));
        }

        if self.worker.concurrency == 0 || self.worker.queue_capacity == 0 {
            return Err(anyhow!(
                "WEBHOOK_CONCURRENCY and WEBHOOK_QUEUE_CAPACITY must be greater than 0"
            ));
        }

        if self.simulation.min_delay_secs > self.simulation.max_delay_secs {
            return Err(anyhow!(
                "SIMULATION_MIN_DELAY_SECS ({}) cannot exceed SIMULATION_MAX_DELAY_SECS ({})",
                self.simulation.min_delay_secs,
                self.simulation.max_delay_secs
            ));
        }

        self.reconciliation
            .terminal_policy
            .parse::<TerminalPolicy>()
            .map_err(|e| anyhow!("TERMINAL_POLICY: {}", e))?;

        Ok(())
    }

    pub fn terminal_policy(&self) -> TerminalPolicy {
        self.reconciliation
            .terminal_policy
            .parse()
            .unwrap_or_default()
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_secs(self.transport.timeout_secs),
            max_retries: self.transport.max_retries,
            backoff_base: Duration::from_millis(self.transport.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.transport.backoff_cap_ms),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_attempts: self.worker.max_attempts,
            attempt_timeout: Duration::from_secs(self.worker.attempt_timeout_secs),
            retry_delay: Duration::from_millis(self.worker.retry_delay_ms),
            concurrency: self.worker.concurrency,
            queue_capacity: self.worker.queue_capacity,
        }
    }

    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            enabled: self.simulation.enabled,
            min_delay: Duration::from_secs(self.simulation.min_delay_secs),
            max_delay: Duration::from_secs(self.simulation.max_delay_secs),
        }
    }
}

fn default_active() -> bool {
    true
}

/// Provider entry as written in the catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSeed {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ProviderSeed {
    pub fn into_provider_config(self) -> ProviderConfig {
        let mut provider = ProviderConfig::new(
            self.name,
            self.base_url,
            self.config.unwrap_or_else(|| Value::Object(Default::default())),
        );
        provider.active = self.active;
        provider
    }
}

/// Seed data for the `providers` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    #[serde(default)]
    pub providers: Vec<ProviderSeed>,
}

impl ProviderCatalog {
    /// Load a TOML catalog from `path`
    pub fn load(path: &str) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::new(path, ::config::FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read provider catalog {}", path))?
            .try_deserialize()
            .with_context(|| format!("Invalid provider catalog {}", path))
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::from_str(source, ::config::FileFormat::Toml))
            .build()
            .context("Failed to parse provider catalog")?
            .try_deserialize()
            .context("Invalid provider catalog")
    }

    pub fn into_provider_configs(self) -> Vec<ProviderConfig> {
        self.providers
            .into_iter()
            .map(ProviderSeed::into_provider_config)
            .collect()
    }
}
