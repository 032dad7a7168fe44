//! Gemini `generateContent` chat backend.
//!
//! The REST endpoint is stateless, so the session keeps the history itself
//! and sends it in full, together with the system instruction, on every
//! turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use postcraft_core::config::{ChatConfig, GeminiConfig};
use postcraft_core::credential::CredentialStore;
use postcraft_core::gemini::{Content, GenerateContentRequest, GenerateContentResponse};
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::session::{ChatService, ChatSession};

/// Opens Gemini chat sessions for one model.
pub struct GeminiChatService {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    credentials: Arc<CredentialStore>,
}

impl GeminiChatService {
    pub fn new(
        gemini: &GeminiConfig,
        chat: &ChatConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(gemini.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: gemini.model_endpoint(&chat.model, "generateContent"),
            model: chat.model.clone(),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatService for GeminiChatService {
    async fn create_session(&self, directive: &str) -> Result<Box<dyn ChatSession>, ChatError> {
        info!(model = %self.model, "Opening chat session");
        Ok(Box::new(GeminiChatSession {
            http: self.http.clone(),
            endpoint: self.endpoint.clone(),
            credentials: Arc::clone(&self.credentials),
            system_instruction: Content::instruction(directive),
            history: Vec::new(),
        }))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

struct GeminiChatSession {
    http: reqwest::Client,
    endpoint: String,
    credentials: Arc<CredentialStore>,
    system_instruction: Content,
    history: Vec<Content>,
}

impl GeminiChatSession {
    fn build_request(&self, message: &str) -> GenerateContentRequest {
        let mut contents = self.history.clone();
        contents.push(Content::user(message));
        GenerateContentRequest {
            contents,
            system_instruction: Some(self.system_instruction.clone()),
            generation_config: None,
        }
    }

    /// Record a successful exchange. A reply without visible text is
    /// refused and leaves the history untouched.
    fn accept_reply(
        &mut self,
        message: &str,
        payload: &GenerateContentResponse,
    ) -> Result<String, ChatError> {
        let reply = payload.text();
        if reply.trim().is_empty() {
            let finish_reason = payload
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .unwrap_or("none");
            warn!(finish_reason, "Chat reply carried no text");
            return Err(ChatError::Service(format!(
                "chat reply contained no text (finish reason: {})",
                finish_reason
            )));
        }

        self.history.push(Content::user(message));
        self.history.push(Content::model(reply.clone()));
        Ok(reply)
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send(&mut self, message: &str) -> Result<String, ChatError> {
        // Resolved per call so a newly selected key applies immediately.
        let api_key = self.credentials.resolve()?;
        let request = self.build_request(message);

        debug!(history = self.history.len(), "Sending chat turn");
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat request rejected");
            return Err(ChatError::Service(format!(
                "chat request failed with status {}: {}",
                status,
                body.trim()
            )));
        }

        let payload: GenerateContentResponse = response.json().await?;
        self.accept_reply(message, &payload)
    }

    fn history_len(&self) -> usize {
        self.history.len()
    }
}
