//! Liveness and readiness probes.

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

/// Liveness probe. Always succeeds while the process is running.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness probe.
///
/// The server only starts serving after migrations have run, so once the
/// router is up the service is ready.
pub async fn readiness_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}
