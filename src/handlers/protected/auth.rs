use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{AuthUser, CurrentTenant};

/// GET /api/auth/whoami - the authenticated identity and resolved tenant
pub async fn whoami(
    Extension(auth): Extension<AuthUser>,
    Extension(tenant): Extension<CurrentTenant>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(json!({
        "success": true,
        "data": {
            "user": {
                "id": auth.user_id,
                "email": auth.email,
                "role": auth.role,
            },
            "tenant": {
                "id": tenant.id,
                "name": tenant.name,
                "slug": tenant.slug,
                "plan": tenant.plan,
            }
        }
    })))
}
