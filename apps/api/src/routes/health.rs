use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

/// GET /health
/// Liveness probe: status and current server time.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
