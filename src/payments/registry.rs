//! Adapter registry
//!
//! Static table from canonical provider name to adapter constructor, built
//! once at process start. Resolution fails closed.

use crate::error::{AppError, AppResult};
use crate::payments::providers::{SubadqA, SubadqB};
use crate::payments::traits::PaymentProvider;
use crate::payments::transport::HttpTransport;
use crate::payments::types::ProviderConfig;
use crate::reconciliation::engine::TransactionStateEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared collaborators handed to every adapter
#[derive(Clone)]
pub struct ProviderDeps {
    pub transport: HttpTransport,
    pub engine: Arc<TransactionStateEngine>,
}

pub type ProviderFactory = fn(ProviderConfig, ProviderDeps) -> Arc<dyn PaymentProvider>;

fn subadq_a(config: ProviderConfig, deps: ProviderDeps) -> Arc<dyn PaymentProvider> {
    Arc::new(SubadqA::new(config, deps))
}

fn subadq_b(config: ProviderConfig, deps: ProviderDeps) -> Arc<dyn PaymentProvider> {
    Arc::new(SubadqB::new(config, deps))
}

pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
    deps: ProviderDeps,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new(deps: ProviderDeps) -> Self {
        Self {
            factories: HashMap::new(),
            deps,
        }
    }

    /// Registry with every adapter the platform ships
    pub fn with_defaults(deps: ProviderDeps) -> Self {
        let mut registry = Self::new(deps);
        registry.register("SubadqA", subadq_a);
        registry.register("SubadqB", subadq_b);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ProviderFactory) {
        self.factories.insert(Self::normalize_name(name), factory);
    }

    /// Canonical lookup key: alphanumerics only, lowercased
    pub fn normalize_name(name: &str) -> String {
        name.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn engine(&self) -> &Arc<TransactionStateEngine> {
        &self.deps.engine
    }

    /// Adapter for `config`
    ///
    /// Fails with `ProviderNotFound` when the provider is inactive or no
    /// adapter is registered under its name.
    pub fn resolve(&self, config: &ProviderConfig) -> AppResult<Arc<dyn PaymentProvider>> {
        if !config.active {
            warn!(provider = %config.name, "Provider is inactive");
            return Err(AppError::provider_not_found(&config.name, "provider is inactive"));
        }

        let key = Self::normalize_name(&config.name);
        let factory = self.factories.get(&key).ok_or_else(|| {
            warn!(provider = %config.name, key = %key, "No adapter registered for provider");
            AppError::provider_not_found(&config.name, "no adapter registered")
        })?;

        debug!(provider = %config.name, "Resolved provider adapter");
        Ok(factory(config.clone(), self.deps.clone()))
    }

    /// Adapter for an owner's configured provider, if any
    pub fn resolve_for_owner(
        &self,
        config: Option<&ProviderConfig>,
    ) -> AppResult<Arc<dyn PaymentProvider>> {
        match config {
            Some(config) => self.resolve(config),
            None => {
                warn!("Owner has no provider configured");
                Err(AppError::provider_not_found("<none>", "owner has no provider configured"))
            }
        }
    }
}
