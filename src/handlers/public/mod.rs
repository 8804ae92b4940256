// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Service information and liveness. No /api prefix, no middleware.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::server::AppState;

/// GET / - service information
pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Portal API",
            "version": version,
            "description": "Multi-tenant HR portal backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "app_system": "/api/app-system/* (protected)",
                "customer_manual": "/api/customer-manual/* (protected)",
            }
        }
    }))
}

/// GET /health - main database ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
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
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
