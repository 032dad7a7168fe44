//! Integration tests for the Postcraft API.
//!
//! Each test builds its own state around scripted backends and drives the
//! router with `oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use postcraft_api::handlers::HealthResponse;
use postcraft_api::{create_router, AppState};
use postcraft_chat::MockChatService;
use postcraft_core::config::PostcraftConfig;
use postcraft_core::credential::CredentialStore;
use postcraft_core::types::{MediaKind, MediaStatus};
use postcraft_media::{
    GenerationError, ImageGenerator, MockImageBackend, ScriptedVideoBackend, VideoGenerator,
};

// =============================================================================
// Helpers
// =============================================================================

const FINAL_REPLY: &str = "Here it is!\n```json\n{\"status\":\"finalized\",\"content_caption\":\"Hello 🎉\",\"hashtags\":[\"#a\",\"#b\"],\"image_prompt\":\"a cat\",\"video_prompt\":\"a cat running\"}\n```";

struct Harness {
    state: AppState,
    chat: MockChatService,
    image: MockImageBackend,
    video: ScriptedVideoBackend,
}

impl Harness {
    fn app(&self) -> axum::Router {
        create_router(self.state.clone())
    }
}

fn harness_with(credentials: CredentialStore) -> Harness {
    let chat = MockChatService::new();
    let image = MockImageBackend::new();
    let video = ScriptedVideoBackend::completing_after(2);
    let state = AppState::new(
        PostcraftConfig::default(),
        Arc::new(chat.clone()),
        Arc::new(ImageGenerator::new(Arc::new(image.clone()))),
        Arc::new(VideoGenerator::new(Arc::new(video.clone()), Duration::ZERO)),
        Arc::new(credentials),
    )
    .unwrap();
    Harness {
        state,
        chat,
        image,
        video,
    }
}

fn harness() -> Harness {
    harness_with(CredentialStore::with_key("test-key"))
}

/// A harness whose credential store can never resolve a key from the
/// environment.
fn keyless_harness() -> Harness {
    harness_with(CredentialStore::new(vec![
        "POSTCRAFT_API_TEST_UNSET_KEY".to_string()
    ]))
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Send the finalizing turn so a post exists.
async fn finalize(h: &Harness) {
    h.chat.push_reply(FINAL_REPLY);
    let resp = h
        .app()
        .oneshot(post_json("/chat", r#"{"message":"Finalize"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Wait for a background job to leave `pending`.
async fn settled_status(h: &Harness, kind: MediaKind) -> MediaStatus {
    for _ in 0..200 {
        let status = h.state.store.lock().unwrap().media(kind).status();
        if status != MediaStatus::Pending {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{} job never finished", kind);
}

// =============================================================================
// Ungated endpoints
// =============================================================================

#[tokio::test]
async fn test_health_happy_path() {
    let resp = harness().app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.credential_configured);
}

#[tokio::test]
async fn test_health_without_credential() {
    let resp = keyless_harness().app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(!health.credential_configured);
}

#[tokio::test]
async fn test_credential_status_reports_source() {
    let resp = harness().app().oneshot(get("/credential")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["configured"], true);
    assert_eq!(json["source"]["source"], "selected");
}

// =============================================================================
// Credential gate
// =============================================================================

#[tokio::test]
async fn test_gated_routes_require_credential() {
    let h = keyless_harness();
    for uri in ["/state", "/messages", "/post", "/media/image", "/events"] {
        let resp = h.app().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "credential_required");
    }
    let resp = h
        .app()
        .oneshot(post_json("/chat", r#"{"message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(h.chat.sent_messages().is_empty());
}

#[tokio::test]
async fn test_selecting_key_opens_gate() {
    let h = keyless_harness();
    let resp = h
        .app()
        .oneshot(post_json("/credential", r#"{"api_key":"  abc123  "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["configured"], true);
    assert_eq!(h.state.credentials.resolve().unwrap(), "abc123");

    let resp = h.app().oneshot(get("/state")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_selecting_blank_key_rejected() {
    let h = keyless_harness();
    let resp = h
        .app()
        .oneshot(post_json("/credential", r#"{"api_key":"   "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!h.state.credentials.is_configured());
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_happy_path() {
    let h = harness();
    h.chat.push_reply("Who is the audience?");

    let resp = h
        .app()
        .oneshot(post_json("/chat", r#"{"message":"coffee post idea"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["user_turn"]["text"], "coffee post idea");
    assert_eq!(json["user_turn"]["role"], "user");
    assert_eq!(json["reply_turn"]["text"], "Who is the audience?");
    assert_eq!(json["reply_turn"]["is_error"], false);
    assert!(json["finalized_post"].is_null());

    let resp = h.app().oneshot(get("/messages")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_finalization_sets_post() {
    let h = harness();
    let resp = h.app().oneshot(get("/post")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    finalize(&h).await;

    let resp = h.app().oneshot(get("/post")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["content_caption"], "Hello 🎉");
    assert_eq!(json["hashtags"], serde_json::json!(["#a", "#b"]));
    assert_eq!(json["video_prompt"], "a cat running");
}

#[tokio::test]
async fn test_chat_service_failure_records_error_turn() {
    let h = harness();
    h.chat.push_failure("HTTP 500");

    let resp = h
        .app()
        .oneshot(post_json("/chat", r#"{"message":"hello"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["reply_turn"]["is_error"], true);
    assert_eq!(
        json["reply_turn"]["text"],
        "Sorry, I encountered an error. Please try again."
    );
}

#[tokio::test]
async fn test_chat_empty_message_rejected() {
    let h = harness();
    let resp = h
        .app()
        .oneshot(post_json("/chat", r#"{"message":"   "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
    assert!(h.state.store.lock().unwrap().turns().is_empty());
}

#[tokio::test]
async fn test_chat_malformed_body_rejected() {
    let resp = harness()
        .app()
        .oneshot(post_json("/chat", r#"{"text":"wrong field"}"#))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

// =============================================================================
// Media
// =============================================================================

#[tokio::test]
async fn test_generate_without_post_is_not_found() {
    let h = harness();
    let resp = h
        .app()
        .oneshot(post_empty("/media/image/generate"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(h.image.calls(), 0);
}

#[tokio::test]
async fn test_unknown_media_kind_is_not_found() {
    let resp = harness()
        .app()
        .oneshot(get("/media/audio"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_generation_end_to_end() {
    let h = harness();
    finalize(&h).await;
    h.image.push_image(Some("image/png"), "QUJD");

    let resp = h
        .app()
        .oneshot(post_empty("/media/image/generate"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(resp).await["outcome"], "started");

    assert_eq!(
        settled_status(&h, MediaKind::Image).await,
        MediaStatus::Succeeded
    );
    assert_eq!(h.image.prompts(), vec!["a cat"]);

    let resp = h.app().oneshot(get("/media/image")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["kind"], "image");
    assert_eq!(json["status"], "succeeded");
    assert_eq!(json["artifact"]["mime_type"], "image/png");

    let resp = h.app().oneshot(get("/media/image/artifact")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(body_bytes(resp).await, b"ABC");
}

#[tokio::test]
async fn test_video_generation_end_to_end() {
    let h = harness();
    finalize(&h).await;

    let resp = h
        .app()
        .oneshot(post_empty("/media/video/generate"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        settled_status(&h, MediaKind::Video).await,
        MediaStatus::Succeeded
    );
    assert_eq!(h.video.polls(), 3);
    assert_eq!(h.video.prompts(), vec!["a cat running"]);

    let resp = h.app().oneshot(get("/media/video/artifact")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
}

#[tokio::test]
async fn test_image_failure_marks_slot_failed() {
    let h = harness();
    finalize(&h).await;
    h.image.push_failure("HTTP 500");

    let resp = h
        .app()
        .oneshot(post_empty("/media/image/generate"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(
        settled_status(&h, MediaKind::Image).await,
        MediaStatus::Failed
    );

    let json = body_json(h.app().oneshot(get("/media/image")).await.unwrap()).await;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["message"], "Failed to generate image. Try again.");
    assert!(json.get("artifact").is_none());

    let resp = h.app().oneshot(get("/media/image/artifact")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_while_pending_conflicts() {
    let h = harness();
    finalize(&h).await;
    h.state
        .store
        .lock()
        .unwrap()
        .set_media_status(MediaKind::Video, MediaStatus::Pending)
        .unwrap();

    let resp = h
        .app()
        .oneshot(post_empty("/media/video/generate"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(h.video.submissions(), 0);
}

#[tokio::test]
async fn test_new_post_resets_media() {
    let h = harness();
    finalize(&h).await;
    h.image.push_image(None, "QUJD");
    h.app()
        .oneshot(post_empty("/media/image/generate"))
        .await
        .unwrap();
    assert_eq!(
        settled_status(&h, MediaKind::Image).await,
        MediaStatus::Succeeded
    );

    finalize(&h).await;

    let json = body_json(h.app().oneshot(get("/state")).await.unwrap()).await;
    assert_eq!(json["media"]["image"]["status"], "idle");
    assert!(json["media"]["image"].get("artifact").is_none());
    assert_eq!(json["post_epoch"], 2);
}

// =============================================================================
// State and events
// =============================================================================

#[test]
fn test_state_rejects_swapped_generators() {
    let image = ImageGenerator::new(Arc::new(MockImageBackend::new()));
    let video = VideoGenerator::new(
        Arc::new(ScriptedVideoBackend::completing_after(0)),
        Duration::ZERO,
    );
    let result = AppState::new(
        PostcraftConfig::default(),
        Arc::new(MockChatService::new()),
        Arc::new(video),
        Arc::new(image),
        Arc::new(CredentialStore::with_key("test-key")),
    );
    assert!(matches!(
        result,
        Err(GenerationError::WrongKind {
            slot: MediaKind::Image,
            produces: MediaKind::Video,
        })
    ));
}

#[tokio::test]
async fn test_state_snapshot_shape() {
    let h = harness();
    let json = body_json(h.app().oneshot(get("/state")).await.unwrap()).await;
    assert_eq!(json["turns"], serde_json::json!([]));
    assert!(json["finalized_post"].is_null());
    assert_eq!(json["media"]["image"]["status"], "idle");
    assert_eq!(json["media"]["video"]["status"], "idle");
    assert_eq!(json["post_epoch"], 0);
}

#[tokio::test]
async fn test_events_stream_content_type() {
    let resp = harness().app().oneshot(get("/events")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_events_stream_ends_on_shutdown() {
    let h = harness();
    let resp = h.app().oneshot(get("/events")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let reader = tokio::spawn(axum::body::to_bytes(resp.into_body(), usize::MAX));
    h.state.trigger_shutdown();
    assert!(h.state.is_shutting_down());

    let body = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("event stream kept the connection open after shutdown")
        .unwrap();
    assert!(body.is_ok());
}

#[tokio::test]
async fn test_events_opened_after_shutdown_end_immediately() {
    let h = harness();
    h.state.trigger_shutdown();

    let resp = h.app().oneshot(get("/events")).await.unwrap();
    let body = tokio::time::timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(resp.into_body(), usize::MAX),
    )
    .await
    .expect("event stream did not end")
    .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_store_changes_reach_event_channel() {
    let h = harness();
    let mut rx = h.state.event_tx.subscribe();
    h.chat.push_reply("ok");
    h.app()
        .oneshot(post_json("/chat", r#"{"message":"hi"}"#))
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.event_name(), "turn_appended");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.event_name(), "turn_appended");
}
