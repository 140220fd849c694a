use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Reports the service version and whether the upload directory is reachable.
/// The database is not probed here.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let uploads_ready = tokio::fs::try_exists(state.uploads.processed_dir())
        .await
        .unwrap_or(false);

    Json(json!({
        "status": if uploads_ready { "ok" } else { "degraded" },
        "service": "cvmatch-api",
        "version": env!("CARGO_PKG_VERSION"),
        "uploads_ready": uploads_ready,
    }))
}
