use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::models::tenant::Tenant;
use crate::rls::TENANT_GUC;

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),

    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant slug: {0}")]
    InvalidSlug(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Manager(#[from] DatabaseError),
}

pub struct TenantService {
    pool: PgPool,
}

const TENANT_COLUMNS: &str =
    "id, name, slug, plan, is_active, created_at, updated_at, deleted_at";

impl TenantService {
    pub fn new() -> Result<Self, TenantError> {
        Ok(Self {
            pool: DatabaseManager::pool()?,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a tenant and seed its owner user in one transaction.
    ///
    /// The slug has a unique index and the insert uses ON CONFLICT DO
    /// NOTHING, so two concurrent creations of the same slug race cleanly:
    /// exactly one wins, the other sees no returned row and reports a
    /// conflict. The owner insert runs under the new tenant's context
    /// because `users` is RLS-forced and its WITH CHECK clause would
    /// otherwise reject the row.
    pub async fn create_tenant(
        &self,
        name: &str,
        slug: &str,
        plan: &str,
        owner_email: &str,
        owner_password: &str,
    ) -> Result<Tenant, TenantError> {
        validate_slug(slug)?;

        let mut tx = self.pool.begin().await?;

        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            r#"
            INSERT INTO tenants (name, slug, plan)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            RETURNING {}
            "#,
            TENANT_COLUMNS
        ))
        .bind(name)
        .bind(slug)
        .bind(plan)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TenantError::AlreadyExists(slug.to_string()))?;

        sqlx::query(&format!("SELECT set_config('{}', $1, true)", TENANT_GUC))
            .bind(tenant.id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO users (tenant_id, email, password_digest, role)
            VALUES ($1, $2, $3, 'owner')
            "#,
        )
        .bind(tenant.id)
        .bind(owner_email)
        .bind(hash_password(owner_password))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Tenant created: {} ({})", tenant.slug, tenant.id);
        Ok(tenant)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Tenant>, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE slug = $1 AND deleted_at IS NULL",
            TENANT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Tenant>, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE id = $1 AND deleted_at IS NULL",
            TENANT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, TenantError> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {} FROM tenants WHERE deleted_at IS NULL ORDER BY created_at DESC",
            TENANT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    /// Suspend: keeps rows, invalidates every outstanding token at the
    /// tenant-context middleware.
    pub async fn deactivate(&self, id: Uuid) -> Result<Tenant, TenantError> {
        self.set_active(id, false).await
    }

    pub async fn reactivate(&self, id: Uuid) -> Result<Tenant, TenantError> {
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Tenant, TenantError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            r#"
            UPDATE tenants SET is_active = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            TENANT_COLUMNS
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| TenantError::NotFound(id.to_string()))?;
        Ok(tenant)
    }
}

/// Slug rules: 2..=63 chars, lowercase alphanumeric and hyphens, must start
/// with a letter. The slug appears in login requests and log lines, never in
/// SQL identifiers, so the constraint is about predictability rather than
/// injection.
pub fn validate_slug(slug: &str) -> Result<(), TenantError> {
    if slug.len() < 2 || slug.len() > 63 {
        return Err(TenantError::InvalidSlug(
            "slug must be between 2 and 63 characters".to_string(),
        ));
    }
    if !slug.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        return Err(TenantError::InvalidSlug(
            "slug must start with a lowercase letter".to_string(),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(TenantError::InvalidSlug(
            "slug may only contain lowercase letters, digits, and hyphens".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_reasonable_slugs() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-west-2").is_ok());
    }

    #[test]
    fn rejects_bad_slugs() {
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("2fast").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme_west").is_err());
        assert!(validate_slug("acme west").is_err());
        assert!(validate_slug(&"x".repeat(64)).is_err());
    }
}
