//! API error type and its JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use civic_chat::ChatError;
use civic_core::CivicError;

/// JSON error body: `{"error": "...", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable code such as `bad_request`.
    pub error: String,
    pub message: String,
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// 400: missing or invalid input.
    BadRequest(String),
    /// 401: rejected sign-in credential.
    Unauthorized(String),
    /// 404: unknown session.
    NotFound(String),
    /// 500
    Internal(String),
    /// 503: a dependency did not answer in time.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };
        if status.is_server_error() {
            tracing::error!(code, %message, "Request failed");
        }
        let body = ErrorBody {
            error: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MessageTooLong(_) => ApiError::BadRequest(err.to_string()),
            ChatError::Identity(msg) => ApiError::Unauthorized(msg),
            ChatError::IdentityUnavailable => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::Storage(msg) | ChatError::Subscription(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<CivicError> for ApiError {
    fn from(err: CivicError) -> Self {
        match err {
            CivicError::Config(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
