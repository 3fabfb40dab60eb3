use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Token refresh failed. The message is safe to return to callers; the
    /// upstream body is only ever logged.
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// Upstream answered 2xx but refused the write.
    #[error("Rejected by upstream: {message}")]
    Rejected { message: String, details: Value },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Upstream body larger than the configured cap.
    #[error("Upstream response too large: {0}")]
    TooLarge(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e, None),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
                None,
            ),
            AppError::Auth(e) => {
                tracing::error!("Authentication error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e, None)
            }
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e, None),
            AppError::Upstream {
                status,
                message,
                details,
            } => {
                tracing::error!("Upstream error {}: {}", status, message);
                (StatusCode::INTERNAL_SERVER_ERROR, message, details)
            }
            AppError::Rejected { message, details } => {
                tracing::warn!("Upstream rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message, Some(details))
            }
            AppError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e, None)
            }
            AppError::Timeout(e) => {
                tracing::error!("Request timeout: {}", e);
                (StatusCode::GATEWAY_TIMEOUT, e, None)
            }
            AppError::TooLarge(e) => {
                tracing::error!("Upstream response too large: {}", e);
                (StatusCode::BAD_GATEWAY, e, None)
            }
            AppError::Http(e) => {
                tracing::error!("HTTP error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "HTTP request failed".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e, None)
            }
        };

        let mut body = json!({
            "success": false,
            "error": error_message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
