use axum::Json;
use axum::extract::State;
use linkarr_config::{AppConfig, ConfigPatch};
use serde_json::{Value, json};
use tracing::info;

use crate::errors::ApiResult;
use crate::state::AppState;

/// Secrets are write-only through the API: reads get a masked copy.
fn masked(mut config: AppConfig) -> AppConfig {
    for secret in [
        &mut config.radarr_api_key,
        &mut config.sonarr_api_key,
        &mut config.tmdb_api_key,
        &mut config.tvdb_api_key,
    ] {
        if !secret.is_empty() {
            *secret = "********".to_string();
        }
    }
    config
}

/// `GET /api/config`.
pub async fn get_config(State(state): State<AppState>) -> Json<AppConfig> {
    Json(masked(state.config.load()))
}

/// `PUT /api/config` - merge non-null fields, persist atomically, and
/// restart the auto scanner when its fields changed.
pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> ApiResult<Json<AppConfig>> {
    let before = state.config.load();
    let after = state.config.update(patch)?;

    if before.auto_scan_fields_differ(&after) {
        info!("auto-scan settings changed, restarting driver");
        state.auto_scanner.restart().await;
    }
    Ok(Json(masked(after)))
}

/// `POST /api/config/test-arr` - probe both arr endpoints.
pub async fn test_arr(State(state): State<AppState>) -> Json<Value> {
    let (radarr_ok, radarr_message) = state.engine.radarr().test_connection().await;
    let (sonarr_ok, sonarr_message) = state.engine.sonarr().test_connection().await;
    Json(json!({
        "radarr": { "ok": radarr_ok, "message": radarr_message },
        "sonarr": { "ok": sonarr_ok, "message": sonarr_message },
    }))
}
