use axum::{extract::Query, http::StatusCode, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::rls;
use crate::tasks::{Job, JobQueue};

/// POST /api/admin/rls/apply - provision session functions and re-apply the
/// policy catalog. Idempotent; reports per-table outcomes.
pub async fn apply() -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool()?;
    let summary = rls::bootstrap(&pool).await?;

    let tables: Vec<Value> = summary
        .outcomes
        .iter()
        .map(|o| {
            json!({
                "table": o.table,
                "applied": o.applied,
                "error": o.error,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": summary.all_applied(),
        "data": {
            "applied": summary.applied(),
            "failed": summary.failed(),
            "tables": tables,
        }
    })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
}

/// GET /api/admin/rls/verify - run the cross-tenant isolation probe
pub async fn verify(Query(query): Query<VerifyQuery>) -> Result<Json<Value>, ApiError> {
    let pool = DatabaseManager::pool()?;
    let report = rls::verify_isolation(&pool, query.tenant_a, query.tenant_b).await?;

    Ok(Json(json!({
        "success": report.passed(),
        "data": report,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
}

/// POST /api/admin/rls/audit - queue the isolation probe on the background
/// worker instead of holding the request open; a breach lands in the logs.
pub async fn audit(
    Extension(jobs): Extension<JobQueue>,
    Json(request): Json<AuditRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if request.tenant_a == request.tenant_b {
        return Err(ApiError::bad_request("Audit requires two distinct tenants"));
    }

    jobs.enqueue(Job::IsolationAudit {
        tenant_a: request.tenant_a,
        tenant_b: request.tenant_b,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "data": { "queued": true }
        })),
    ))
}
