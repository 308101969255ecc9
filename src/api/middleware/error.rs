use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failure kinds surfaced by the admission core.
///
/// `AdmissionRejected` and `StateMismatch` are deliberately distinct so a
/// caller can pick different retry policies: the former is a transient busy
/// signal from a rate-limit layer, the latter a terminal business-rule
/// rejection (location mismatch, insufficient duration, overlap detected).
#[derive(Debug)]
pub enum ApiError {
    AdmissionRejected(String),
    StateMismatch(String),
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::AdmissionRejected(msg) => write!(f, "Admission rejected: {}", msg),
            ApiError::StateMismatch(msg) => write!(f, "State mismatch: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::AdmissionRejected(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::StateMismatch(msg) => (StatusCode::CONFLICT, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                ApiError::Internal(format!("Database error: {}", db_err.message()))
            }
            _ => ApiError::Internal(format!("Database error: {}", err)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
