use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use super::{ok, HandlerResult};

pub async fn banner() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "PeerNova API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health_check() -> HandlerResult {
    ok(
        json!({ "status": "ok", "timestamp": Utc::now() }),
        "Server is healthy",
    )
}
