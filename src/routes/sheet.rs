use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use axum_extra::extract::WithRejection;
use serde_json::Value;
use std::sync::Arc;

use super::method_not_allowed;
use crate::error::{AppError, AppResult};
use crate::models::SheetQuery;
use crate::services::sheet::SheetRequest;
use crate::utils::validation::{field, parse_flag, validate_request};
use crate::AppState;

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/get-sheet-data",
        get(get_sheet_data).fallback(method_not_allowed),
    )
}

async fn get_sheet_data(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<SheetQuery>, AppError>,
) -> AppResult<Json<Value>> {
    validate_request(&query)?;
    let optional = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let request = SheetRequest {
        resource_id: field(&query.resource_id),
        worksheet: optional(&query.worksheet),
        range: optional(&query.range),
        refresh: parse_flag(query.refresh.as_deref()),
    };

    let read = state.sheet.read(request).await?;
    Ok(Json(read.to_envelope()))
}
