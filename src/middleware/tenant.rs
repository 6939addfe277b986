use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::FromRow;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::{DatabaseManager, TenantDb};
use crate::error::ApiError;

/// Tenant validated against the registry for this request
#[derive(Clone, Debug, FromRow)]
pub struct CurrentTenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
}

/// Middleware that resolves the JWT's tenant against the registry.
///
/// The token alone is not trusted to name a live tenant: the tenant must
/// still exist, be active, and not be soft-deleted at request time, so a
/// suspended tenant's outstanding tokens stop working immediately. On
/// success the request gains `CurrentTenant` and a ready `TenantDb`.
pub async fn tenant_context_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| {
            ApiError::unauthorized("JWT authentication required before tenant resolution")
        })?
        .clone();

    let pool = DatabaseManager::pool()?;

    let tenant = sqlx::query_as::<_, CurrentTenant>(
        r#"
        SELECT id, name, slug, plan
        FROM tenants
        WHERE id = $1
          AND is_active = true
          AND deleted_at IS NULL
        "#,
    )
    .bind(auth_user.tenant_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error resolving tenant: {}", e);
        ApiError::internal_server_error("Failed to resolve tenant")
    })?
    .ok_or_else(|| {
        tracing::warn!(
            "Tenant resolution failed: tenant {} not found or inactive",
            auth_user.tenant_id
        );
        ApiError::forbidden("Tenant is not active or does not exist")
    })?;

    tracing::debug!("Tenant context established: {} ({})", tenant.slug, tenant.id);

    let tenant_db = TenantDb::new(pool, tenant.id);
    request.extensions_mut().insert(tenant);
    request.extensions_mut().insert(tenant_db);

    Ok(next.run(request).await)
}

/// Gate for the admin surface: only tenant owners pass.
pub async fn require_owner_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if auth_user.role != "owner" {
        return Err(ApiError::forbidden("Owner role required"));
    }

    Ok(next.run(request).await)
}
