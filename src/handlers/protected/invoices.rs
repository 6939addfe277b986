use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::invoice::{CreateInvoiceRequest, Invoice, InvoiceListQuery, InvoiceStatus};
use crate::tasks::{Job, JobQueue};

const INVOICE_COLUMNS: &str = "id, tenant_id, customer_name, line_items, amount_cents, \
     currency, status, invoice_number, issued_at, created_at, updated_at";

/// POST /api/invoices - create a draft invoice
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    if request.line_items.is_empty() {
        return Err(ApiError::unprocessable_entity("Invoice needs at least one line item"));
    }
    if request
        .line_items
        .iter()
        .any(|li| li.quantity <= 0 || li.unit_price_cents < 0)
    {
        return Err(ApiError::unprocessable_entity(
            "Line items need a positive quantity and a non-negative price",
        ));
    }

    let amount = request
        .line_items
        .iter()
        .try_fold(0i64, |sum, li| {
            li.total_cents().and_then(|total| sum.checked_add(total))
        })
        .ok_or_else(|| {
            ApiError::unprocessable_entity("Invoice total exceeds the representable amount")
        })?;

    let mut tx = db.begin().await?;
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        INSERT INTO invoices (tenant_id, customer_name, line_items, amount_cents, currency, status)
        VALUES ($1, $2, $3, $4, $5, 'draft')
        RETURNING {}
        "#,
        INVOICE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&request.customer_name)
    .bind(json!(request.line_items))
    .bind(amount)
    .bind(&request.currency)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /api/invoices - list, optionally filtered by status
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    if let Some(status) = &query.status {
        if InvoiceStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!("Unknown invoice status: {}", status)));
        }
    }
    let (limit, offset) = super::page_limits(query.limit, query.offset);

    let mut tx = db.begin().await?;
    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        SELECT {}
        FROM invoices
        WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        INVOICE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;

    Ok(Json(invoices))
}

/// GET /api/invoices/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let mut tx = db.begin().await?;
    let invoice = fetch_invoice(&mut tx, db.tenant_id(), id).await?;
    tx.rollback().await?;
    Ok(Json(invoice))
}

/// POST /api/invoices/:id/finalize - draft -> open, assigns the invoice number
pub async fn finalize(
    Extension(db): Extension<TenantDb>,
    Extension(auth): Extension<AuthUser>,
    Extension(jobs): Extension<JobQueue>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    let mut tx = db.begin().await?;

    // Locking one draft's row would not stop two finalizes of different
    // drafts from computing the same MAX+1, so number assignment serializes
    // on a per-tenant advisory lock instead. Released with the transaction.
    let (hi, lo) = tenant_lock_keys(db.tenant_id());
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(hi)
        .bind(lo)
        .execute(&mut *tx)
        .await?;

    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {} FROM invoices WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        INVOICE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Invoice {} not found", id)))?;

    let current = parse_status(&invoice.status)?;
    if !current.can_transition_to(InvoiceStatus::Open) {
        return Err(ApiError::conflict(format!(
            "Invoice is {}, only drafts can be finalized",
            invoice.status
        )));
    }

    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        UPDATE invoices
        SET status = 'open',
            invoice_number = (
                SELECT COALESCE(MAX(invoice_number), 0) + 1
                FROM invoices WHERE tenant_id = $1
            ),
            issued_at = now(),
            updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        INVOICE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    jobs.enqueue(Job::SendEmail {
        tenant_id: db.tenant_id(),
        to: auth.email.clone(),
        subject: format!("Invoice #{} issued", invoice.invoice_number.unwrap_or_default()),
        body: format!(
            "Invoice for {} totaling {} {} cents is now open.",
            invoice.customer_name, invoice.amount_cents, invoice.currency
        ),
    });

    Ok(Json(invoice))
}

/// POST /api/invoices/:id/pay - open -> paid
pub async fn pay(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    transition(&db, id, InvoiceStatus::Paid).await
}

/// POST /api/invoices/:id/void - draft|open -> void
pub async fn void(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    transition(&db, id, InvoiceStatus::Void).await
}

async fn transition(
    db: &TenantDb,
    id: Uuid,
    next: InvoiceStatus,
) -> Result<Json<Invoice>, ApiError> {
    let mut tx = db.begin().await?;
    let invoice = fetch_invoice(&mut tx, db.tenant_id(), id).await?;

    let current = parse_status(&invoice.status)?;
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Invoice cannot move from {} to {}",
            invoice.status,
            next.as_str()
        )));
    }

    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        UPDATE invoices SET status = $3, updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        INVOICE_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(Json(invoice))
}

async fn fetch_invoice(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Invoice, ApiError> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {} FROM invoices WHERE tenant_id = $1 AND id = $2",
        INVOICE_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Invoice {} not found", id)))
}

fn parse_status(status: &str) -> Result<InvoiceStatus, ApiError> {
    InvoiceStatus::parse(status).ok_or_else(|| {
        tracing::error!("Invoice row carries unknown status: {}", status);
        ApiError::internal_server_error("Invoice is in an unknown state")
    })
}

/// Stable two-int advisory lock key for a tenant, folding each half of the
/// UUID down to 32 bits. `pg_advisory_xact_lock` takes (int4, int4).
fn tenant_lock_keys(tenant_id: Uuid) -> (i32, i32) {
    let n = tenant_id.as_u128();
    let hi = (n >> 64) as u64;
    let lo = n as u64;
    ((hi ^ (hi >> 32)) as u32 as i32, (lo ^ (lo >> 32)) as u32 as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_stable_per_tenant() {
        let tenant = Uuid::parse_str("3e0f9a4c-6b21-4d8e-9f37-5a1c2b8d4e60").unwrap();
        assert_eq!(tenant_lock_keys(tenant), tenant_lock_keys(tenant));
    }

    #[test]
    fn lock_keys_differ_across_tenants() {
        let a = Uuid::parse_str("3e0f9a4c-6b21-4d8e-9f37-5a1c2b8d4e60").unwrap();
        let b = Uuid::parse_str("91d4c7f2-08e3-47ab-b6c5-2f9e0d1a3b84").unwrap();
        assert_ne!(tenant_lock_keys(a), tenant_lock_keys(b));
    }
}
