pub mod crm;
pub mod sheet;
pub mod system;
pub mod workdrive;

use axum::Router;
use std::sync::Arc;

use crate::error::AppError;
use crate::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(system::create_routes())
        .merge(crm::create_routes())
        .merge(workdrive::create_routes())
        .merge(sheet::create_routes())
        .fallback(route_not_found)
        .with_state(state)
}

/// Known path, unsupported method.
pub(crate) async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}
