//! Row-level-security tenant isolation.
//!
//! Tenants share one PostgreSQL database; every tenant-scoped table carries a
//! `tenant_id uuid` column and an RLS policy comparing it against the
//! `app.current_tenant_id` session GUC. This module owns the whole layer in
//! one place: the session functions wrapping the GUC, the declarative catalog
//! of policied tables, and the isolation probe that proves the policies hold.

pub mod catalog;
pub mod verify;

pub use catalog::{apply_policies, ApplySummary, POLICY_NAME, TENANT_TABLES};
pub use verify::{verify_isolation, VerifyReport};

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

/// Session parameter carrying the current tenant through a connection.
pub const TENANT_GUC: &str = "app.current_tenant_id";

#[derive(Debug, Error)]
pub enum RlsError {
    #[error("Table not in tenant policy catalog: {0}")]
    UnknownTable(String),

    #[error("Isolation breach: {0}")]
    IsolationBreach(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Provision the session-context SQL functions.
///
/// All three are SECURITY INVOKER (the default): `current_tenant_id()` must
/// evaluate with the calling role's rights inside policy predicates, and the
/// setter pair must not be able to escalate anything. `current_tenant_id()`
/// is STABLE so the planner evaluates it once per query, and it maps an
/// unset or cleared GUC to NULL, which every policy predicate rejects.
/// Idempotent via CREATE OR REPLACE.
pub async fn provision_functions(pool: &PgPool) -> Result<(), RlsError> {
    let statements = [
        format!(
            r#"
            CREATE OR REPLACE FUNCTION set_tenant_context(tenant uuid)
            RETURNS void
            LANGUAGE plpgsql
            AS $$
            BEGIN
                PERFORM set_config('{guc}', tenant::text, false);
            END;
            $$
            "#,
            guc = TENANT_GUC
        ),
        format!(
            r#"
            CREATE OR REPLACE FUNCTION clear_tenant_context()
            RETURNS void
            LANGUAGE plpgsql
            AS $$
            BEGIN
                PERFORM set_config('{guc}', '', false);
            END;
            $$
            "#,
            guc = TENANT_GUC
        ),
        format!(
            r#"
            CREATE OR REPLACE FUNCTION current_tenant_id()
            RETURNS uuid
            LANGUAGE sql
            STABLE
            AS $$
                SELECT NULLIF(current_setting('{guc}', true), '')::uuid;
            $$
            "#,
            guc = TENANT_GUC
        ),
    ];

    for sql in &statements {
        sqlx::query(sql).execute(pool).await?;
    }

    info!("RLS session functions provisioned");
    Ok(())
}

/// Provision functions and apply the policy catalog in one pass.
pub async fn bootstrap(pool: &PgPool) -> Result<ApplySummary, RlsError> {
    provision_functions(pool).await?;
    apply_policies(pool).await
}
