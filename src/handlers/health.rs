use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;

/// GET / - service banner
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Trellis API",
            "version": version,
            "description": "Multi-tenant business management backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/login, /auth/refresh (public - token acquisition)",
                "whoami": "/api/auth/whoami (protected)",
                "invoices": "/api/invoices[/:id] (protected)",
                "payroll": "/api/payroll/runs[/:id] (protected)",
                "deliveries": "/api/deliveries[/:id] (protected)",
                "leads": "/api/leads[/:id] (protected)",
                "chat": "/api/chat/threads[/:id] (protected)",
                "products": "/api/products[/:id] (protected)",
                "integrations": "/api/integrations[/:id] (protected)",
                "admin": "/api/admin/* (owner role required)",
            }
        }
    }))
}

/// GET /health - liveness plus database reachability
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
