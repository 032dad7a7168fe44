//! Route handler functions for all API endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use postcraft_chat::TurnOutcome;
use postcraft_core::credential::CredentialSource;
use postcraft_core::store::{lock_store, StoreSnapshot};
use postcraft_core::types::{ConversationTurn, FinalizedPost, MediaKind, MediaSlotView};
use postcraft_media::StartOutcome;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub credential_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct CredentialStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CredentialSource>,
}

#[derive(Debug, Deserialize)]
pub struct SelectCredentialRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub kind: MediaKind,
    #[serde(flatten)]
    pub slot: MediaSlotView,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub kind: MediaKind,
    pub outcome: StartOutcome,
}

fn parse_kind(kind: &str) -> Result<MediaKind, ApiError> {
    kind.parse().map_err(ApiError::NotFound)
}

// =============================================================================
// Ungated
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        credential_configured: state.credentials.is_configured(),
    })
}

/// GET /credential
pub async fn get_credential(State(state): State<AppState>) -> Json<CredentialStatus> {
    Json(CredentialStatus {
        configured: state.credentials.is_configured(),
        source: state.credentials.source(),
    })
}

/// POST /credential - select an API key at runtime.
pub async fn select_credential(
    State(state): State<AppState>,
    Json(body): Json<SelectCredentialRequest>,
) -> Result<Json<CredentialStatus>, ApiError> {
    state.credentials.select(&body.api_key)?;
    Ok(Json(CredentialStatus {
        configured: true,
        source: state.credentials.source(),
    }))
}

// =============================================================================
// Conversation
// =============================================================================

/// GET /state
pub async fn get_state(State(state): State<AppState>) -> Result<Json<StoreSnapshot>, ApiError> {
    let snapshot = lock_store(&state.store)?.snapshot();
    Ok(Json(snapshot))
}

/// GET /messages
pub async fn get_messages(
    State(state): State<AppState>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = lock_store(&state.store)?.turns().to_vec();
    Ok(Json(MessagesResponse { messages }))
}

/// POST /chat - send one user turn.
///
/// A failed model call still answers 200: the reply turn is the
/// error-flagged failure turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let outcome = state.conversation.submit(&body.message).await?;
    debug!(
        is_error = outcome.reply_turn.is_error,
        finalized = outcome.finalized_post.is_some(),
        "Chat turn handled"
    );
    Ok(Json(outcome))
}

/// GET /post
pub async fn get_post(State(state): State<AppState>) -> Result<Json<FinalizedPost>, ApiError> {
    let post = lock_store(&state.store)?.finalized_post().cloned();
    post.map(Json)
        .ok_or_else(|| ApiError::NotFound("No post has been finalized yet".to_string()))
}

// =============================================================================
// Media
// =============================================================================

/// POST /media/{kind}/generate
pub async fn generate_media(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    match state.media.start(kind)? {
        StartOutcome::Started => {
            info!(%kind, "Media generation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(StartResponse {
                    kind,
                    outcome: StartOutcome::Started,
                }),
            ))
        }
        StartOutcome::AlreadyPending => Err(ApiError::Conflict(format!(
            "{} generation is already pending",
            kind
        ))),
    }
}

/// GET /media/{kind}
pub async fn get_media(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<MediaResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let slot = lock_store(&state.store)?.media(kind).view();
    Ok(Json(MediaResponse { kind, slot }))
}

/// GET /media/{kind}/artifact - raw bytes of a finished artifact.
pub async fn get_media_artifact(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let artifact = lock_store(&state.store)?
        .media(kind)
        .artifact()
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("No {} has been generated", kind)))?;

    let bytes = artifact.to_bytes()?;
    Ok((
        [(header::CONTENT_TYPE, artifact.mime_type().to_string())],
        bytes,
    ))
}

// =============================================================================
// Events
// =============================================================================

/// GET /events - SSE stream of state events.
///
/// The stream ends when the server begins shutting down, so graceful
/// shutdown never waits on a connected viewer.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send> {
    let rx = state.event_tx.subscribe();
    let events = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Some(Event::default().event(event.event_name()).data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });
    let stop = WatchStream::new(state.shutdown_receiver())
        .filter(|closing| *closing)
        .map(|_| None);
    let stream = events.merge(stop).map_while(|item| item.map(Ok::<_, Infallible>));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
