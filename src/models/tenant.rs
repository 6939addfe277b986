use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Registry row for one tenant. Lives in the shared `tenants` table, which is
/// deliberately NOT in the RLS catalog: the registry is what tenant context
/// is resolved *from*.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
    #[serde(default = "default_plan")]
    pub plan: String,
    pub owner_email: String,
    pub owner_password: String,
}

fn default_plan() -> String {
    "standard".to_string()
}
