use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// E-commerce integration registration. Sync happens through the background
/// worker, which stamps the bookkeeping columns; no vendor API is called.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Integration {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub provider: String,
    pub shop_domain: String,
    pub is_enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub provider: String,
    pub shop_domain: String,
}
