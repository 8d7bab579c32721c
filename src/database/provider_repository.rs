use crate::database::error::DatabaseError;
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::ProviderConfig;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Provider catalog and owner assignments
pub struct ProviderRepository {
    pool: PgPool,
}

impl ProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a provider by name; an existing row keeps its id
    pub async fn upsert(&self, provider: &ProviderConfig) -> Result<ProviderConfig, DatabaseError> {
        let stored = sqlx::query_as::<_, ProviderConfig>(
            "INSERT INTO providers (id, name, base_url, config, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
             ON CONFLICT (name) DO UPDATE
             SET base_url = EXCLUDED.base_url, config = EXCLUDED.config,
                 active = EXCLUDED.active, updated_at = NOW()
             RETURNING id, name, base_url, config, active",
        )
        .bind(provider.id)
        .bind(&provider.name)
        .bind(&provider.base_url)
        .bind(&provider.config)
        .bind(provider.active)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        info!(provider = %stored.name, provider_id = %stored.id, "Provider upserted");
        Ok(stored)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ProviderConfig>, DatabaseError> {
        sqlx::query_as::<_, ProviderConfig>(
            "SELECT id, name, base_url, config, active FROM providers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lookup ignoring case and punctuation, matching registry resolution
    pub async fn find_by_name(&self, name: &str) -> Result<Option<ProviderConfig>, DatabaseError> {
        sqlx::query_as::<_, ProviderConfig>(
            "SELECT id, name, base_url, config, active FROM providers
             WHERE lower(regexp_replace(name, '[^a-zA-Z0-9]', '', 'g')) = $1",
        )
        .bind(ProviderRegistry::normalize_name(name))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Provider assigned to an owner, `None` when unassigned
    pub async fn find_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<ProviderConfig>, DatabaseError> {
        sqlx::query_as::<_, ProviderConfig>(
            "SELECT p.id, p.name, p.base_url, p.config, p.active
             FROM providers p
             JOIN owners o ON o.provider_id = p.id
             WHERE o.id = $1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_active(&self) -> Result<Vec<ProviderConfig>, DatabaseError> {
        sqlx::query_as::<_, ProviderConfig>(
            "SELECT id, name, base_url, config, active FROM providers
             WHERE active = true ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
