//! Image generation: one `generateContent` call returning inline data.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use postcraft_core::config::{GeminiConfig, ImageConfig};
use postcraft_core::credential::CredentialStore;
use postcraft_core::gemini::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    ImageGenerationConfig,
};
use postcraft_core::types::{MediaArtifact, MediaKind};
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::generator::MediaGenerator;

const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Backend that answers an image prompt with a raw model response.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate_content(
        &self,
        prompt: &str,
    ) -> Result<GenerateContentResponse, GenerationError>;

    fn name(&self) -> &str;
}

/// Picks the inline image out of the backend's response.
pub struct ImageGenerator {
    backend: Arc<dyn ImageBackend>,
}

impl ImageGenerator {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl MediaGenerator for ImageGenerator {
    fn kind(&self) -> MediaKind {
        MediaKind::Image
    }

    async fn generate(&self, prompt: &str) -> Result<MediaArtifact, GenerationError> {
        debug!(backend = self.backend.name(), "Requesting image");
        let response = self.backend.generate_content(prompt).await?;

        let inline = response.first_image().ok_or_else(|| {
            GenerationError::MissingData("no inline image part in response".to_string())
        })?;
        let mime_type = inline.mime_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME);
        info!(mime_type, bytes = inline.data.len(), "Image generated");
        Ok(MediaArtifact::data_uri(mime_type, &inline.data))
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// `generateContent` against an image-capable Gemini model.
pub struct GeminiImageBackend {
    http: reqwest::Client,
    endpoint: String,
    aspect_ratio: String,
    credentials: Arc<CredentialStore>,
}

impl GeminiImageBackend {
    pub fn new(
        gemini: &GeminiConfig,
        image: &ImageConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(gemini.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: gemini.model_endpoint(&image.model, "generateContent"),
            aspect_ratio: image.aspect_ratio.clone(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: None,
                image_config: Some(ImageGenerationConfig {
                    aspect_ratio: self.aspect_ratio.clone(),
                }),
            }),
        }
    }
}

#[async_trait]
impl ImageBackend for GeminiImageBackend {
    async fn generate_content(
        &self,
        prompt: &str,
    ) -> Result<GenerateContentResponse, GenerationError> {
        let api_key = self.credentials.resolve()?;
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key.as_str())])
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Image request rejected");
            return Err(GenerationError::Service(format!(
                "image request failed with status {}: {}",
                status,
                body.trim()
            )));
        }
        Ok(response.json().await?)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ---------------------------------------------------------------------------
// MockImageBackend - scripted responses for tests
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ImageScript {
    responses: Mutex<VecDeque<Result<GenerateContentResponse, String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

/// Image backend that replays queued responses in order.
#[derive(Debug, Clone, Default)]
pub struct MockImageBackend {
    script: Arc<ImageScript>,
}

impl MockImageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response carrying one inline image part.
    pub fn push_image(&self, mime_type: Option<&str>, base64_data: &str) -> &Self {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{
                        "inlineData": { "mimeType": mime_type, "data": base64_data }
                    }]
                }
            }]
        });
        let response = serde_json::from_value(body).unwrap_or_default();
        self.push_response(response)
    }

    /// Queue an arbitrary response, e.g. one with text parts only.
    pub fn push_response(&self, response: GenerateContentResponse) -> &Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock_responses().push_back(Err(message.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script
            .prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<GenerateContentResponse, String>>> {
        self.script
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn generate_content(
        &self,
        prompt: &str,
    ) -> Result<GenerateContentResponse, GenerationError> {
        self.script.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        match self.lock_responses().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(GenerationError::Service(message)),
            None => Err(GenerationError::Service("mock script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
