use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use offline_cache::{CacheError, FetchError};
use service::errors::ServiceError;
use thiserror::Error;

/// `{"error": ..., "message": ...}` with a status code.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: &'static str, message: Option<String>) -> Self {
        Self { status, error, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", Some(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", Some(message.into()))
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => serde_json::json!({ "error": self.error, "message": message }),
            None => serde_json::json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(msg) => JsonApiError::new(StatusCode::BAD_REQUEST, "Validation Error", Some(msg)),
            ServiceError::Model(m) => JsonApiError::bad_request(m.to_string()),
            ServiceError::NotFound(msg) => JsonApiError::not_found(msg),
            ServiceError::Storage(s) => {
                JsonApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", Some(s.to_string()))
            }
        }
    }
}

impl From<FetchError> for JsonApiError {
    fn from(e: FetchError) -> Self {
        JsonApiError::new(StatusCode::BAD_GATEWAY, "Bad Gateway", Some(e.to_string()))
    }
}

impl From<CacheError> for JsonApiError {
    fn from(e: CacheError) -> Self {
        JsonApiError::bad_request(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

