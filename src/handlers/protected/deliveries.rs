use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::models::delivery::{
    AssignCourierRequest, CreateDeliveryRequest, DeliveryListQuery, DeliveryOrder,
    DeliveryStatus, DeliveryStatusRequest,
};

const ORDER_COLUMNS: &str = "id, tenant_id, pickup_address, dropoff_address, courier_name, \
     status, delivered_at, created_at, updated_at";

/// POST /api/deliveries
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<DeliveryOrder>), ApiError> {
    if request.pickup_address.trim().is_empty() || request.dropoff_address.trim().is_empty() {
        return Err(ApiError::unprocessable_entity(
            "Pickup and dropoff addresses are required",
        ));
    }

    let mut tx = db.begin().await?;
    let order = sqlx::query_as::<_, DeliveryOrder>(&format!(
        r#"
        INSERT INTO delivery_orders (tenant_id, pickup_address, dropoff_address, status)
        VALUES ($1, $2, $3, 'pending')
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(request.pickup_address.trim())
    .bind(request.dropoff_address.trim())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/deliveries - list, optionally filtered by status
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<DeliveryListQuery>,
) -> Result<Json<Vec<DeliveryOrder>>, ApiError> {
    if let Some(status) = &query.status {
        if DeliveryStatus::parse(status).is_none() {
            return Err(ApiError::bad_request(format!("Unknown delivery status: {}", status)));
        }
    }
    let (limit, offset) = super::page_limits(query.limit, query.offset);

    let mut tx = db.begin().await?;
    let orders = sqlx::query_as::<_, DeliveryOrder>(&format!(
        r#"
        SELECT {}
        FROM delivery_orders
        WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        ORDER_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;

    Ok(Json(orders))
}

/// GET /api/deliveries/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOrder>, ApiError> {
    let mut tx = db.begin().await?;
    let order = fetch_order(&mut tx, db.tenant_id(), id).await?;
    tx.rollback().await?;
    Ok(Json(order))
}

/// POST /api/deliveries/:id/assign - pending -> assigned with a courier
pub async fn assign(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignCourierRequest>,
) -> Result<Json<DeliveryOrder>, ApiError> {
    if request.courier_name.trim().is_empty() {
        return Err(ApiError::unprocessable_entity("Courier name is required"));
    }

    let mut tx = db.begin().await?;
    let order = fetch_order(&mut tx, db.tenant_id(), id).await?;
    ensure_transition(&order, DeliveryStatus::Assigned)?;

    let order = sqlx::query_as::<_, DeliveryOrder>(&format!(
        r#"
        UPDATE delivery_orders
        SET status = 'assigned', courier_name = $3, updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(request.courier_name.trim())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(order))
}

/// PUT /api/deliveries/:id/status - advance along the lifecycle
pub async fn set_status(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
    Json(request): Json<DeliveryStatusRequest>,
) -> Result<Json<DeliveryOrder>, ApiError> {
    let next = DeliveryStatus::parse(&request.status)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown delivery status: {}", request.status)))?;

    let mut tx = db.begin().await?;
    let order = fetch_order(&mut tx, db.tenant_id(), id).await?;
    ensure_transition(&order, next)?;

    let order = sqlx::query_as::<_, DeliveryOrder>(&format!(
        r#"
        UPDATE delivery_orders
        SET status = $3,
            delivered_at = CASE WHEN $3 = 'delivered' THEN now() ELSE delivered_at END,
            updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        ORDER_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(order))
}

async fn fetch_order(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<DeliveryOrder, ApiError> {
    sqlx::query_as::<_, DeliveryOrder>(&format!(
        "SELECT {} FROM delivery_orders WHERE tenant_id = $1 AND id = $2",
        ORDER_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Delivery order {} not found", id)))
}

fn ensure_transition(order: &DeliveryOrder, next: DeliveryStatus) -> Result<(), ApiError> {
    let current = DeliveryStatus::parse(&order.status).ok_or_else(|| {
        tracing::error!("Delivery order carries unknown status: {}", order.status);
        ApiError::internal_server_error("Delivery order is in an unknown state")
    })?;
    if !current.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Delivery cannot move from {} to {}",
            order.status,
            next.as_str()
        )));
    }
    Ok(())
}
