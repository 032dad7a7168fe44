//! Credential gate for routes that reach the model service.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// Answers 503 `credential_required` until an API key can be resolved.
pub async fn require_credential(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.credentials.is_configured() {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "Request blocked until an API key is selected");
    ApiError::CredentialRequired(
        "Select an API key (POST /credential) before using this endpoint".to_string(),
    )
    .into_response()
}
