use std::path::PathBuf;

use axum::Json;
use axum::extract::State;
use linkarr_model::LibraryStats;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::errors::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Optional subdirectory; omitted means all configured sources.
    pub path: Option<String>,
}

/// `POST /api/scan` - start a scan in the background. 409 when one is
/// already running, 412 when `require_arr` is set and an arr endpoint is
/// down.
pub async fn start_scan(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<Value>> {
    if state.config.load().require_arr {
        let (radarr_ok, radarr_message) = state.engine.radarr().test_connection().await;
        let (sonarr_ok, sonarr_message) = state.engine.sonarr().test_connection().await;
        if !radarr_ok || !sonarr_ok {
            return Err(linkarr_core::CoreError::ArrUnavailable(format!(
                "{radarr_message}; {sonarr_message}"
            ))
            .into());
        }
    }

    let directory = request.path.map(PathBuf::from);
    info!(?directory, "scan requested");
    state.engine.spawn_scan(directory)?;
    Ok(Json(json!({ "status": "started" })))
}

/// `GET /api/scan/status`.
pub async fn scan_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "scanning": state.engine.is_scanning() }))
}

/// `GET /api/stats`.
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<LibraryStats>> {
    let stats = state.engine.store().stats().await?;
    Ok(Json(stats))
}
