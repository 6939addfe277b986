use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::database::TenantDb;
use crate::error::ApiError;
use crate::models::product::{
    CreateProductRequest, Product, ProductListQuery, UpdateProductRequest,
};

const PRODUCT_COLUMNS: &str =
    "id, tenant_id, name, sku, price_cents, stock, archived_at, created_at, updated_at";

/// POST /api/products
pub async fn create(
    Extension(db): Extension<TenantDb>,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if request.price_cents < 0 || request.stock < 0 {
        return Err(ApiError::unprocessable_entity(
            "Price and stock cannot be negative",
        ));
    }

    let mut tx = db.begin().await?;
    let product = sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (tenant_id, name, sku, price_cents, stock)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (tenant_id, sku) DO NOTHING
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(&request.name)
    .bind(&request.sku)
    .bind(request.price_cents)
    .bind(request.stock)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::conflict(format!("SKU '{}' already exists", request.sku)))?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products - optional case-insensitive name prefix search
pub async fn list(
    Extension(db): Extension<TenantDb>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let (limit, offset) = super::page_limits(query.limit, query.offset);
    let prefix = query.search.as_deref().map(like_prefix);

    let mut tx = db.begin().await?;
    let products = sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {}
        FROM products
        WHERE tenant_id = $1
          AND archived_at IS NULL
          AND ($2::text IS NULL OR name ILIKE $2)
        ORDER BY name ASC
        LIMIT $3 OFFSET $4
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(prefix)
    .bind(limit)
    .bind(offset)
    .fetch_all(&mut *tx)
    .await?;
    tx.rollback().await?;

    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let mut tx = db.begin().await?;
    let product = fetch_product(&mut tx, db.tenant_id(), id).await?;
    tx.rollback().await?;
    Ok(Json(product))
}

/// PATCH /api/products/:id - update price and/or stock
pub async fn update(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    if request.price_cents.is_none() && request.stock.is_none() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    if request.price_cents.is_some_and(|p| p < 0) || request.stock.is_some_and(|s| s < 0) {
        return Err(ApiError::unprocessable_entity(
            "Price and stock cannot be negative",
        ));
    }

    let mut tx = db.begin().await?;
    let product = fetch_product(&mut tx, db.tenant_id(), id).await?;
    if product.archived_at.is_some() {
        return Err(ApiError::conflict("Product is archived"));
    }

    let product = sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products
        SET price_cents = COALESCE($3, price_cents),
            stock = COALESCE($4, stock),
            updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .bind(request.price_cents)
    .bind(request.stock)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(product))
}

/// DELETE /api/products/:id - archive (soft)
pub async fn archive(
    Extension(db): Extension<TenantDb>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let mut tx = db.begin().await?;
    let product = fetch_product(&mut tx, db.tenant_id(), id).await?;
    if product.archived_at.is_some() {
        return Err(ApiError::conflict("Product is already archived"));
    }

    let product = sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products SET archived_at = now(), updated_at = now()
        WHERE tenant_id = $1 AND id = $2
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(db.tenant_id())
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Json(product))
}

async fn fetch_product(
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    tenant_id: Uuid,
    id: Uuid,
) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE tenant_id = $1 AND id = $2",
        PRODUCT_COLUMNS
    ))
    .bind(tenant_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))
}

/// Turn a search term into an ILIKE prefix pattern, escaping the pattern
/// metacharacters (`\`, `%`, `_`) so they match literally.
fn like_prefix(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 1);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::like_prefix;

    #[test]
    fn plain_terms_become_prefix_patterns() {
        assert_eq!(like_prefix("widget"), "widget%");
    }

    #[test]
    fn pattern_metacharacters_match_literally() {
        assert_eq!(like_prefix("a_b"), "a\\_b%");
        assert_eq!(like_prefix("50%"), "50\\%%");
        assert_eq!(like_prefix("c:\\temp"), "c:\\\\temp%");
    }
}
