use axum::{extract::Path, http::StatusCode, Extension, Json};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::payroll::{CreatePayrollRunRequest, PayrollRun, PayrollStatus};

const RUN_COLUMNS: &str = "id, tenant_id, period_start, period_end, gross_cents, status, \
     approved_by, approved_at, created_at, updated_at";

/// POST /api/payroll/runs - create a pending run for a pay period.
/// Overlapping periods for the same tenant are rejected: the COUNT is a
/// friendly pre-check, the `payroll_runs_no_overlap` exclusion constraint
/// catches the race where two overlapping creations pass it concurrently.
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreatePayrollRunRequest>,
) -> Result<(StatusCode, Json<PayrollRun>), ApiError> {
    request.validate().map_err(ApiError::unprocessable_entity)?;

    let mut tx = db.begin().await?;

    let overlapping: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM payroll_runs
        WHERE tenant_id = $1 AND period_start <= $3 AND period_end >= $2
        "#,
    )
    .bind(db.tenant_id())
    .bind(request.period_start)
    .bind(request.period_end)
    .fetch_one(&mut *tx)
    .await?;
    if overlapping > 0 {
        return Err(ApiError::conflict("Pay period overlaps an existing run"));
    }

    let run = sqlx::query_as::<_, PayrollRun>(&format!(
        r#"
        INSERT INTO payroll_runs (tenant_id, period_start, period_end, gross_cents, status)
        VALUES ($1, $2, $3, $4, 'pending')
        RETURNING {}
        "#,
        RUN_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(request.period_start)
    .bind(request.period_end)
    .bind(request.gross_cents)
    .fetch_one(&mut *tx)
    .await
    .map_err(overlap_conflict)?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(run)))
}

/// Exclusion-constraint violations (SQLSTATE 23P01) are the concurrent
/// overlapping-period case and report as the same 409 the pre-check gives.
fn overlap_conflict(err: sqlx::Error) -> ApiError {
    let is_exclusion = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23P01");
    if is_exclusion {
        ApiError::conflict("Pay period overlaps an existing run")
    } else {
        err.into()
    }
}

/// GET /api/payroll/runs
pub async fn list(
    Extension(db): Extension<TenantDb>,
) -> Result<Json<Vec<PayrollRun>>, ApiError> {
    let mut tx = db.begin().await?;
    let runs = sqlx::query_as::<_, PayrollRun>(&format!(
        "SELECT {} FROM payroll_runs WHERE tenant_id = $1 ORDER BY period_start DESC",
        RUN_COLUMNS
    ))
    .bind(db.tenant_id())
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;
    Ok(Json(runs))
}

/// GET /api/payroll/runs/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollRun>, ApiError> {
    let mut tx = db.begin().await?;
    let run = fetch_run(&mut tx, db.tenant_id(), id).await?;
    tx.rollback().await?;
    Ok(Json(run))
}

/// POST /api/payroll/runs/:id/approve - pending -> approved, stamps approver
pub async fn approve(
    Extension(db): Extension<TenantDb>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollRun>, ApiError> {
    let mut tx = db.begin().await?;
    let run = fetch_run(&mut tx, db.tenant_id(), id).await?;
    ensure_transition(&run, PayrollStatus::Approved)?;

    let run = sqlx::query_as::<_, PayrollRun>(&format!(
        r#"
        UPDATE payroll_runs
        SET status = 'approved', approved_by = $3, approved_at = now(), updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        RUN_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(auth.user_id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(run))
}

/// POST /api/payroll/runs/:id/pay - approved -> paid
pub async fn pay(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<PayrollRun>, ApiError> {
    let mut tx = db.begin().await?;
    let run = fetch_run(&mut tx, db.tenant_id(), id).await?;
    ensure_transition(&run, PayrollStatus::Paid)?;

    let run = sqlx::query_as::<_, PayrollRun>(&format!(
        r#"
        UPDATE payroll_runs SET status = 'paid', updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        RUN_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(run))
}

async fn fetch_run(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<PayrollRun, ApiError> {
    sqlx::query_as::<_, PayrollRun>(&format!(
        "SELECT {} FROM payroll_runs WHERE tenant_id = $1 AND id = $2",
        RUN_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Payroll run {} not found", id)))
}

fn ensure_transition(run: &PayrollRun, next: PayrollStatus) -> Result<(), ApiError> {
    let current = PayrollStatus::parse(&run.status).ok_or_else(|| {
        tracing::error!("Payroll run carries unknown status: {}", run.status);
        ApiError::internal_server_error("Payroll run is in an unknown state")
    })?;
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Payroll run cannot move from {} to {}",
            run.status,
            next.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;

    #[derive(Debug)]
    struct StubDbError(&'static str);

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "stub database error ({})", self.0)
        }
    }

    impl StdError for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "stub database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(self.0.into())
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubDbError(code)))
    }

    #[test]
    fn concurrent_overlap_loser_gets_conflict_not_500() {
        // SQLSTATE raised by the payroll_runs_no_overlap exclusion constraint
        // when two overlapping creations race past the pre-check
        let err = overlap_conflict(db_error("23P01"));
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn other_database_errors_still_map_normally() {
        let err = overlap_conflict(db_error("57014"));
        assert_eq!(err.status_code(), 500);
    }
}
