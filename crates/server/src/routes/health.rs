//! Liveness check.

use axum::Json;

/// Health check for load balancers and uptime probes.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
