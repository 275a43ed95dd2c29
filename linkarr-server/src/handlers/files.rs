use axum::Json;
use axum::extract::{Path, Query, State};
use linkarr_model::{
    MediaGroup, MediaKind, MediaRecord, RecordQuery, RecordStatus, fold_groups,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::errors::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<RecordStatus>,
    pub kind: Option<MediaKind>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/files` - filtered record listing, newest first.
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<MediaRecord>>> {
    let records = state
        .engine
        .store()
        .query(&RecordQuery {
            status: params.status,
            kind: params.kind,
            search: params.search,
            limit: params.limit,
            offset: params.offset,
        })
        .await?;
    Ok(Json(records))
}

/// `GET /api/media` - records folded into per-title groups, TV bucketed by
/// season.
pub async fn grouped_media(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<MediaGroup>>> {
    let records = state
        .engine
        .store()
        .group_by_media(params.status, params.kind, params.search.as_deref())
        .await?;
    Ok(Json(fold_groups(records)))
}

/// `GET /api/files/{id}`.
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaRecord>> {
    let record = state
        .engine
        .store()
        .get(id)
        .await?
        .ok_or_else(|| linkarr_core::CoreError::NotFound(format!("record {id}")))?;
    Ok(Json(record))
}

/// `POST /api/files/{id}/process` - re-parse and re-run the pipeline now.
pub async fn process_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaRecord>> {
    let record = state.engine.process_file(id).await?;
    Ok(Json(record))
}

/// `POST /api/files/{id}/ignore`.
pub async fn ignore_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaRecord>> {
    let record = state.engine.ignore_record(id).await?;
    Ok(Json(record))
}

/// `DELETE /api/files/{id}` - unlink destination, prune, drop the record.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.engine.remove_record(id).await?;
    Ok(Json(json!({ "status": "deleted", "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct ReprocessRequest {
    pub statuses: Vec<RecordStatus>,
}

/// `POST /api/reprocess` - push matching records back through the pipeline.
pub async fn reprocess(
    State(state): State<AppState>,
    Json(request): Json<ReprocessRequest>,
) -> ApiResult<Json<Value>> {
    let summary = state.engine.reprocess(&request.statuses).await?;
    Ok(Json(json!(summary)))
}
