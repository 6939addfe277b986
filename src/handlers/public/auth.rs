use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{
    generate_jwt, password::verify_password, validate_jwt_allow_expired, within_refresh_grace,
    Claims,
};
use crate::database::TenantDb;
use crate::error::ApiError;
use crate::models::user::{User, UserResponse};
use crate::services::TenantService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub tenant: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

/// POST /auth/login - authenticate against a tenant and receive a JWT.
///
/// Tenant slug plus email plus password. The user lookup runs through a
/// tenant-scoped transaction, so even the login path is subject to RLS. All
/// credential failures collapse into the same 401 so the endpoint doesn't
/// confirm which part was wrong.
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let service = TenantService::new()?;
    let tenant = service
        .get_by_slug(&payload.tenant)
        .await?
        .filter(|t| t.is_active)
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let db = TenantDb::new(service.pool().clone(), tenant.id);
    let mut tx = db.begin().await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, tenant_id, email, password_digest, role, is_active, created_at, updated_at
        FROM users
        WHERE tenant_id = $1 AND email = $2
        "#,
    )
    .bind(tenant.id)
    .bind(&payload.email)
    .fetch_optional(&mut *tx)
    .await?;
    tx.rollback().await?;

    let user = user
        .filter(|u| u.is_active && verify_password(&payload.password, &u.password_digest))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let claims = Claims::new(user.id, tenant.id, user.email.clone(), user.role.clone());
    let token = generate_jwt(&claims)?;

    tracing::info!("Login: {} @ {}", user.email, tenant.slug);

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "expires_at": claims.exp,
            "tenant": tenant.slug,
            "user": UserResponse::from(user),
        }
    })))
}

/// POST /auth/refresh - exchange a possibly-expired token for a fresh one.
///
/// Signature and issuer are always verified; expiry is forgiven within the
/// configured grace window. User and tenant must still be live, so refresh
/// cannot resurrect access that was revoked after the token was issued.
pub async fn refresh(Json(payload): Json<RefreshRequest>) -> Result<Json<Value>, ApiError> {
    let claims = validate_jwt_allow_expired(&payload.token)?;

    if !within_refresh_grace(&claims) {
        return Err(ApiError::unauthorized("Token is beyond the refresh window"));
    }

    let service = TenantService::new()?;
    let tenant = service
        .get(claims.tenant_id)
        .await?
        .filter(|t| t.is_active)
        .ok_or_else(|| ApiError::forbidden("Tenant is not active or does not exist"))?;

    let db = TenantDb::new(service.pool().clone(), tenant.id);
    let mut tx = db.begin().await?;
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, tenant_id, email, password_digest, role, is_active, created_at, updated_at
        FROM users
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(tenant.id)
    .bind(claims.sub)
    .fetch_optional(&mut *tx)
    .await?;
    tx.rollback().await?;

    let user = user
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("User no longer active"))?;

    // Fresh claims pick up any role change since the old token was issued
    let fresh = Claims::new(user.id, tenant.id, user.email, user.role);
    let token = generate_jwt(&fresh)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "token": token,
            "expires_at": fresh.exp,
        }
    })))
}
