//! API error types and JSON error response formatting.
//!
//! Every failure leaves the server as `{error, message}` with a status code
//! chosen by the variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use postcraft_chat::ChatError;
use postcraft_core::error::{CredentialError, PostcraftError, StoreError};
use serde::{Deserialize, Serialize};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "not_found", "credential_required").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 409
    Conflict(String),
    /// 500
    Internal(String),
    /// 502 - the upstream model service failed.
    Upstream(String),
    /// 503 - no API key is available yet.
    CredentialRequired(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::CredentialRequired(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "credential_required", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoFinalizedPost => ApiError::NotFound(err.to_string()),
            StoreError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            StoreError::ArtifactRequired(_) | StoreError::LockPoisoned => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Empty => ApiError::BadRequest(err.to_string()),
            CredentialError::Missing(_) => ApiError::CredentialRequired(err.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::Credential(e) => e.into(),
            ChatError::State(e) => e.into(),
            ChatError::Service(msg) => ApiError::Upstream(msg),
        }
    }
}

impl From<PostcraftError> for ApiError {
    fn from(err: PostcraftError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
