use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::rls::TENANT_GUC;

/// Request-scoped handle for tenant data access.
///
/// Carries the shared pool plus the tenant resolved from the caller's JWT.
/// Every data access happens inside a transaction whose first statement sets
/// the `app.current_tenant_id` GUC with `set_config(..., true)`. The third
/// argument makes the setting transaction-local, so it dies with the
/// transaction and can never leak to the next request that checks the same
/// connection out of the pool. RLS policies evaluate `current_tenant_id()`
/// against this value; application queries additionally bind `tenant_id`
/// explicitly, leaving RLS as defense-in-depth.
#[derive(Clone)]
pub struct TenantDb {
    pool: PgPool,
    tenant_id: Uuid,
}

impl TenantDb {
    pub fn new(pool: PgPool, tenant_id: Uuid) -> Self {
        Self { pool, tenant_id }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    /// Begin a transaction with tenant context already established.
    ///
    /// Rolling back (including drop-without-commit) discards the context
    /// along with the transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("SELECT set_config('{}', $1, true)", TENANT_GUC))
            .bind(self.tenant_id.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// The underlying pool, for queries against non-tenant tables
    /// (the tenant registry itself). Tenant-scoped tables must go
    /// through [`TenantDb::begin`].
    pub fn registry_pool(&self) -> &PgPool {
        &self.pool
    }
}
