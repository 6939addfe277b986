use axum::{extract::Path, http::StatusCode, Extension, Json};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::models::lead::{CreateLeadRequest, Lead, LeadStage, LeadStageRequest};

const LEAD_COLUMNS: &str = "id, tenant_id, contact_name, contact_email, company, stage, \
     converted_at, created_at, updated_at";

/// POST /api/leads
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    if !request.contact_email.contains('@') {
        return Err(ApiError::unprocessable_entity("Contact email is not valid"));
    }

    let mut tx = db.begin().await?;
    let lead = sqlx::query_as::<_, Lead>(&format!(
        r#"
        INSERT INTO leads (tenant_id, contact_name, contact_email, company, stage)
        VALUES ($1, $2, $3, $4, 'new')
        RETURNING {}
        "#,
        LEAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&request.contact_name)
    .bind(&request.contact_email)
    .bind(&request.company)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(lead)))
}

/// GET /api/leads
pub async fn list(Extension(db): Extension<TenantDb>) -> Result<Json<Vec<Lead>>, ApiError> {
    let mut tx = db.begin().await?;
    let leads = sqlx::query_as::<_, Lead>(&format!(
        "SELECT {} FROM leads WHERE tenant_id = $1 ORDER BY created_at DESC",
        LEAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;
    Ok(Json(leads))
}

/// GET /api/leads/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Lead>, ApiError> {
    let mut tx = db.begin().await?;
    let lead = fetch_lead(&mut tx, db.tenant_id(), id).await?;
    tx.rollback().await?;
    Ok(Json(lead))
}

/// PUT /api/leads/:id/stage - advance the lead; converting stamps converted_at
pub async fn set_stage(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
    Json(request): Json<LeadStageRequest>,
) -> Result<Json<Lead>, ApiError> {
    let next = LeadStage::parse(&request.stage)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown lead stage: {}", request.stage)))?;

    let mut tx = db.begin().await?;
    let lead = fetch_lead(&mut tx, db.tenant_id(), id).await?;

    let current = LeadStage::parse(&lead.stage).ok_or_else(|| {
        tracing::error!("Lead carries unknown stage: {}", lead.stage);
        ApiError::internal_server_error("Lead is in an unknown state")
    })?;
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Lead cannot move from {} to {}",
            lead.stage,
            next.as_str()
        )));
    }

    let lead = sqlx::query_as::<_, Lead>(&format!(
        r#"
        UPDATE leads
        SET stage = $3,
            converted_at = CASE WHEN $3 = 'converted' THEN now() ELSE converted_at END,
            updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        LEAD_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(lead))
}

async fn fetch_lead(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Lead, ApiError> {
    sqlx::query_as::<_, Lead>(&format!(
        "SELECT {} FROM leads WHERE tenant_id = $1 AND id = $2",
        LEAD_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Lead {} not found", id)))
}
