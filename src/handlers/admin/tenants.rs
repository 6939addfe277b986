use axum::{extract::Path, http::StatusCode, Json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::tenant::{CreateTenantRequest, Tenant};
use crate::services::TenantService;

/// POST /api/admin/tenants - provision a tenant with its owner user
pub async fn create(
    Json(request): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<Tenant>), ApiError> {
    if !request.owner_email.contains('@') {
        return Err(ApiError::unprocessable_entity("Owner email is not valid"));
    }
    if request.owner_password.len() < 8 {
        return Err(ApiError::unprocessable_entity(
            "Owner password must be at least 8 characters",
        ));
    }

    let service = TenantService::new()?;
    let tenant = service
        .create_tenant(
            &request.name,
            &request.slug,
            &request.plan,
            &request.owner_email,
            &request.owner_password,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(tenant)))
}

/// GET /api/admin/tenants
pub async fn list() -> Result<Json<Vec<Tenant>>, ApiError> {
    let service = TenantService::new()?;
    Ok(Json(service.list().await?))
}

/// GET /api/admin/tenants/:id
pub async fn show(Path(id): Path<Uuid>) -> Result<Json<Tenant>, ApiError> {
    let service = TenantService::new()?;
    let tenant = service
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Tenant {} not found", id)))?;
    Ok(Json(tenant))
}

/// POST /api/admin/tenants/:id/deactivate
pub async fn deactivate(Path(id): Path<Uuid>) -> Result<Json<Tenant>, ApiError> {
    let service = TenantService::new()?;
    Ok(Json(service.deactivate(id).await?))
}

/// POST /api/admin/tenants/:id/reactivate
pub async fn reactivate(Path(id): Path<Uuid>) -> Result<Json<Tenant>, ApiError> {
    let service = TenantService::new()?;
    Ok(Json(service.reactivate(id).await?))
}
