use axum::{extract::Path, http::StatusCode, Extension, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::models::integration::{CreateIntegrationRequest, Integration};
use crate::tasks::{Job, JobQueue};

const INTEGRATION_COLUMNS: &str = "id, tenant_id, provider, shop_domain, is_enabled, \
     last_synced_at, last_sync_status, created_at, updated_at";

const KNOWN_PROVIDERS: &[&str] = &["shopify", "woocommerce", "etsy"];

/// POST /api/integrations - register an e-commerce integration
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<(StatusCode, Json<Integration>), ApiError> {
    if !KNOWN_PROVIDERS.contains(&request.provider.as_str()) {
        return Err(ApiError::unprocessable_entity(format!(
            "Unknown provider '{}'",
            request.provider
        )));
    }

    let mut tx = db.begin().await?;
    let integration = sqlx::query_as::<_, Integration>(&format!(
        r#"
        INSERT INTO integrations (tenant_id, provider, shop_domain)
        VALUES ($1, $2, $3)
        RETURNING {}
        "#,
        INTEGRATION_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&request.provider)
    .bind(&request.shop_domain)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(integration)))
}

/// GET /api/integrations
pub async fn list(
    Extension(db): Extension<TenantDb>,
) -> Result<Json<Vec<Integration>>, ApiError> {
    let mut tx = db.begin().await?;
    let integrations = sqlx::query_as::<_, Integration>(&format!(
        "SELECT {} FROM integrations WHERE tenant_id = $1 ORDER BY created_at DESC",
        INTEGRATION_COLUMNS
    ))
    .bind(db.tenant_id())
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;
    Ok(Json(integrations))
}

/// POST /api/integrations/:id/sync - enqueue a background sync
pub async fn sync(
    Extension(db): Extension<TenantDb>,
    Extension(jobs): Extension<JobQueue>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut tx = db.begin().await?;
    let integration = sqlx::query_as::<_, Integration>(&format!(
        "SELECT {} FROM integrations WHERE tenant_id = $1 AND id = $2",
        INTEGRATION_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Integration {} not found", id)))?;
    tx.rollback().await?;

    if !integration.is_enabled {
        return Err(ApiError::conflict("Integration is disabled"));
    }

    jobs.enqueue(Job::SyncIntegration {
        tenant_id: db.tenant_id(),
        integration_id: id,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "data": { "queued": true, "integration_id": id }
        })),
    ))
}
