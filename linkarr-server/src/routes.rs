use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{config, events, files, scan, system};
use crate::state::AppState;

/// Assemble the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(system::health))
        .route("/api/files", get(files::list_files))
        .route("/api/files/{id}", get(files::get_file))
        .route("/api/files/{id}", delete(files::delete_file))
        .route("/api/files/{id}/process", post(files::process_file))
        .route("/api/files/{id}/ignore", post(files::ignore_file))
        .route("/api/media", get(files::grouped_media))
        .route("/api/reprocess", post(files::reprocess))
        .route("/api/scan", post(scan::start_scan))
        .route("/api/scan/status", get(scan::scan_status))
        .route("/api/stats", get(scan::stats))
        .route("/api/config", get(config::get_config))
        .route("/api/config", put(config::update_config))
        .route("/api/config/test-arr", post(config::test_arr))
        .route("/api/autoscan/status", get(system::auto_scan_status))
        .route("/api/events", get(events::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
