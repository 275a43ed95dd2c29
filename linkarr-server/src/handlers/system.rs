use axum::Json;
use axum::extract::State;
use linkarr_model::AutoScanStatus;
use serde_json::{Value, json};

use crate::state::AppState;

/// `GET /api/health`.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/autoscan/status`.
pub async fn auto_scan_status(State(state): State<AppState>) -> Json<AutoScanStatus> {
    Json(state.auto_scanner.status().await)
}
