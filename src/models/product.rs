use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub stock: i64,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    /// Case-insensitive name prefix search
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
