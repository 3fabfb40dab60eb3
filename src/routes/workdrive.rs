use axum::{
    extract::{Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use serde_json::{json, Value};
use std::sync::Arc;

use super::method_not_allowed;
use crate::error::{AppError, AppResult};
use crate::models::{Disposition, FileQuery, WorkDriveListQuery, WorkDriveSearchQuery};
use crate::services::workdrive::{FolderListing, SearchParams};
use crate::services::WorkDriveService;
use crate::utils::validation::{
    field, parse_flag, parse_offset, validate_request, WORKDRIVE_LIST_LIMIT,
    WORKDRIVE_SEARCH_LIMIT,
};
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/workdrive-search",
            get(search).fallback(method_not_allowed),
        )
        .route(
            "/api/workdrive-list-files",
            get(list_files).fallback(method_not_allowed),
        )
        .route(
            "/api/workdrive-file",
            get(file_details).fallback(method_not_allowed),
        )
        .route(
            "/api/workdrive-download",
            get(download).fallback(method_not_allowed),
        )
        .route("/proxy-download", get(download).fallback(method_not_allowed))
        .route(
            "/api/workdrive-download-base64",
            get(download_base64).fallback(method_not_allowed),
        )
}

fn workdrive(state: &AppState) -> AppResult<&WorkDriveService> {
    state.workdrive.as_deref().ok_or_else(|| {
        AppError::Config("Zoho WorkDrive is not configured (set ZOHO_WORKDRIVE_ORG_ID)".into())
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn search(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<WorkDriveSearchQuery>, AppError>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let params = SearchParams {
        query: field(&query.query),
        parent_id: non_empty(&query.parent_id),
        limit: WORKDRIVE_SEARCH_LIMIT.clamp(query.limit.as_deref()),
        offset: parse_offset(query.offset.as_deref()),
        // Folders are included unless explicitly turned off.
        include_folders: query
            .include_folders
            .as_deref()
            .map_or(true, |v| !v.trim().eq_ignore_ascii_case("false")),
    };

    let results = workdrive(&state)?.search(params).await?;
    Ok(Json(results.to_envelope()))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<WorkDriveListQuery>, AppError>,
) -> AppResult<Json<FolderListing>> {
    validate_request(&query)?;
    let limit = WORKDRIVE_LIST_LIMIT.clamp(query.limit.as_deref());
    let parent_id = non_empty(&query.parent_id);
    let next_token = non_empty(&query.next_token);

    let listing = workdrive(&state)?
        .list_folder(parent_id.as_deref(), limit, next_token.as_deref())
        .await?;
    Ok(Json(listing))
}

async fn file_details(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<FileQuery>, AppError>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let item = workdrive(&state)?.get_file(&field(&query.file_id)).await?;

    Ok(Json(json!({
        "success": true,
        "data": item,
    })))
}

async fn download(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<FileQuery>, AppError>,
) -> AppResult<Response> {
    validate_request(&query)?;
    let disposition = if parse_flag(query.inline.as_deref()) {
        Disposition::Inline
    } else {
        Disposition::Attachment
    };

    let file = workdrive(&state)?.download(&field(&query.file_id)).await?;
    Ok(file.into_binary_response(disposition))
}

async fn download_base64(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<FileQuery>, AppError>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let file = workdrive(&state)?.download(&field(&query.file_id)).await?;
    Ok(Json(file.to_base64_envelope()))
}
