//! Video generation: a long-running job that is submitted, polled until it
//! reports done, and then downloaded.
//!
//! There is no ceiling on the number of polls. A failed attempt is never
//! resumed; the caller starts a fresh one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use postcraft_core::config::{GeminiConfig, VideoConfig};
use postcraft_core::credential::CredentialStore;
use postcraft_core::types::{MediaArtifact, MediaKind};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::generator::MediaGenerator;

const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// A long-running operation handle as reported by the job service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct VideoOperation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl VideoOperation {
    /// A not-yet-finished operation.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A finished operation whose first sample is at `uri`.
    pub fn completed(name: impl Into<String>, uri: &str) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: None,
            response: Some(serde_json::json!({
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": uri } }]
                }
            })),
        }
    }

    /// A finished operation that reports an error.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            error: Some(OperationError {
                code: None,
                message: message.into(),
            }),
            response: None,
        }
    }

    /// Locator of the first generated video, in either response shape.
    pub fn video_uri(&self) -> Option<&str> {
        let response = self.response.as_ref()?;
        [
            "/generateVideoResponse/generatedSamples/0/video/uri",
            "/generatedVideos/0/video/uri",
        ]
        .iter()
        .find_map(|path| response.pointer(path).and_then(|v| v.as_str()))
        .filter(|uri| !uri.is_empty())
    }
}

/// Downloaded video bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoDownload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Job service for long-running video generation.
#[async_trait]
pub trait VideoJobBackend: Send + Sync {
    /// Submit a job and return its operation handle.
    async fn submit(&self, prompt: &str) -> Result<VideoOperation, GenerationError>;

    /// Fetch the current state of an operation.
    async fn poll(&self, operation_name: &str) -> Result<VideoOperation, GenerationError>;

    /// Fetch the finished video.
    async fn download(&self, uri: &str) -> Result<VideoDownload, GenerationError>;

    fn name(&self) -> &str;
}

/// Drives a [`VideoJobBackend`] from submission to downloaded bytes.
pub struct VideoGenerator {
    backend: Arc<dyn VideoJobBackend>,
    poll_interval: Duration,
}

impl VideoGenerator {
    pub fn new(backend: Arc<dyn VideoJobBackend>, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }
}

#[async_trait]
impl MediaGenerator for VideoGenerator {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    async fn generate(&self, prompt: &str) -> Result<MediaArtifact, GenerationError> {
        let mut operation = self.backend.submit(prompt).await?;
        info!(
            backend = self.backend.name(),
            operation = %operation.name,
            "Video job submitted"
        );

        let mut polls = 0u32;
        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            operation = self.backend.poll(&operation.name).await?;
            debug!(polls, done = operation.done, "Video job polled");
        }

        if let Some(error) = operation.error.take() {
            warn!(polls, code = ?error.code, "Video job reported an error");
            return Err(GenerationError::JobFailed(error.message));
        }

        let uri = operation.video_uri().ok_or_else(|| {
            GenerationError::MissingData("operation finished without a video uri".to_string())
        })?;
        let download = self.backend.download(uri).await?;
        if download.bytes.is_empty() {
            return Err(GenerationError::Download("empty video body".to_string()));
        }

        info!(polls, bytes = download.bytes.len(), "Video generated");
        Ok(MediaArtifact::Blob {
            mime_type: download.mime_type,
            bytes: download.bytes,
        })
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters<'a>,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    resolution: &'a str,
    aspect_ratio: &'a str,
}

/// `predictLongRunning` against a Veo model.
pub struct GeminiVideoBackend {
    http: reqwest::Client,
    gemini: GeminiConfig,
    video: VideoConfig,
    credentials: Arc<CredentialStore>,
}

impl GeminiVideoBackend {
    pub fn new(
        gemini: &GeminiConfig,
        video: &VideoConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(gemini.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            gemini: gemini.clone(),
            video: video.clone(),
            credentials,
        })
    }

    pub fn submit_endpoint(&self) -> String {
        self.gemini
            .model_endpoint(&self.video.model, "predictLongRunning")
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> PredictRequest<'a> {
        PredictRequest {
            instances: [PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: self.video.sample_count,
                resolution: &self.video.resolution,
                aspect_ratio: &self.video.aspect_ratio,
            },
        }
    }

    async fn read_operation(
        response: reqwest::Response,
        what: &str,
    ) -> Result<VideoOperation, GenerationError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, what, "Video request rejected");
            return Err(GenerationError::Service(format!(
                "video {} failed with status {}: {}",
                what,
                status,
                body.trim()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoJobBackend for GeminiVideoBackend {
    async fn submit(&self, prompt: &str) -> Result<VideoOperation, GenerationError> {
        let api_key = self.credentials.resolve()?;
        let response = self
            .http
            .post(self.submit_endpoint())
            .query(&[("key", api_key.as_str())])
            .json(&self.build_request(prompt))
            .send()
            .await?;
        Self::read_operation(response, "submission").await
    }

    async fn poll(&self, operation_name: &str) -> Result<VideoOperation, GenerationError> {
        let api_key = self.credentials.resolve()?;
        let response = self
            .http
            .get(self.gemini.resource_url(operation_name))
            .query(&[("key", api_key.as_str())])
            .send()
            .await?;
        Self::read_operation(response, "poll").await
    }

    async fn download(&self, uri: &str) -> Result<VideoDownload, GenerationError> {
        let api_key = self.credentials.resolve()?;
        let response = self
            .http
            .get(uri)
            .query(&[("key", api_key.as_str())])
            .send()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Download(format!("status {}", status)));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or_else(|| DEFAULT_VIDEO_MIME.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Download(e.to_string()))?;
        Ok(VideoDownload {
            mime_type,
            bytes: bytes.to_vec(),
        })
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ---------------------------------------------------------------------------
// ScriptedVideoBackend - deterministic job service for tests
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct VideoScript {
    submission: Mutex<Option<Result<VideoOperation, String>>>,
    polls: Mutex<VecDeque<Result<VideoOperation, String>>>,
    download: Mutex<Result<VideoDownload, String>>,
    prompts: Mutex<Vec<String>>,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

/// Video backend that answers polls from a queue.
///
/// Every submission returns the same not-done operation unless a failure
/// was scripted. Polls pop the queue, which may hold scripted failures; an
/// empty queue keeps answering not-done.
#[derive(Debug, Clone)]
pub struct ScriptedVideoBackend {
    script: Arc<VideoScript>,
}

impl ScriptedVideoBackend {
    pub const OPERATION: &'static str = "models/veo/operations/scripted";
    pub const VIDEO_URI: &'static str = "https://files.example/v1/video.mp4?alt=media";

    /// Reports not-done `pending_polls` times, then done with a video.
    pub fn completing_after(pending_polls: usize) -> Self {
        let mut polls: VecDeque<VideoOperation> = (0..pending_polls)
            .map(|_| VideoOperation::pending(Self::OPERATION))
            .collect();
        polls.push_back(VideoOperation::completed(Self::OPERATION, Self::VIDEO_URI));
        Self::with_polls(polls)
    }

    /// Answers polls with the given operations, in order.
    pub fn with_polls(polls: impl IntoIterator<Item = VideoOperation>) -> Self {
        Self {
            script: Arc::new(VideoScript {
                submission: Mutex::new(None),
                polls: Mutex::new(polls.into_iter().map(Ok).collect()),
                download: Mutex::new(Ok(VideoDownload {
                    mime_type: DEFAULT_VIDEO_MIME.to_string(),
                    bytes: vec![0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p'],
                })),
                prompts: Mutex::new(Vec::new()),
                submit_calls: AtomicUsize::new(0),
                poll_calls: AtomicUsize::new(0),
                download_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn fail_submission(self, message: impl Into<String>) -> Self {
        *self
            .script
            .submission
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(Err(message.into()));
        self
    }

    /// Fail the poll that follows the already queued answers.
    pub fn then_fail_poll(self, message: impl Into<String>) -> Self {
        self.script
            .polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(message.into()));
        self
    }

    pub fn fail_download(self, message: impl Into<String>) -> Self {
        *self
            .script
            .download
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Err(message.into());
        self
    }

    pub fn submissions(&self) -> usize {
        self.script.submit_calls.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.script.poll_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> usize {
        self.script.download_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script
            .prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl VideoJobBackend for ScriptedVideoBackend {
    async fn submit(&self, prompt: &str) -> Result<VideoOperation, GenerationError> {
        self.script.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        match self
            .script
            .submission
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            Some(Ok(operation)) => Ok(operation),
            Some(Err(message)) => Err(GenerationError::Service(message)),
            None => Ok(VideoOperation::pending(Self::OPERATION)),
        }
    }

    async fn poll(&self, operation_name: &str) -> Result<VideoOperation, GenerationError> {
        self.script.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .polls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(VideoOperation::pending(operation_name)))
            .map_err(GenerationError::Service)
    }

    async fn download(&self, _uri: &str) -> Result<VideoDownload, GenerationError> {
        self.script.download_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .download
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .map_err(GenerationError::Download)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
