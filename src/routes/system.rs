use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::method_not_allowed;
use crate::error::{AppError, AppResult};
use crate::AppState;

const SCHEMA: &str = include_str!("openapi.json");

pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check).fallback(method_not_allowed))
        .route("/api/schema", get(get_schema).fallback(method_not_allowed))
        .route(
            "/api/cache-stats",
            get(cache_stats)
                .delete(clear_cache)
                .fallback(method_not_allowed),
        )
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Capability document for tool-calling clients, pointed at this deployment.
async fn get_schema(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let mut schema: Value = serde_json::from_str(SCHEMA)
        .map_err(|e| AppError::Internal(format!("Invalid schema document: {}", e)))?;
    schema["servers"] = json!([{ "url": state.config.public_base_url }]);
    Ok(Json(schema))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.search_cache.stats().await;
    Json(json!({
        "success": true,
        "data": stats,
    }))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<Value> {
    let cleared = state.search_cache.clear().await;
    info!("Search cache cleared ({} entries)", cleared);
    Json(json!({
        "success": true,
        "cleared": cleared,
    }))
}
