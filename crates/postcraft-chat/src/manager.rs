//! Chat session manager: owns the strategist session and the parser.
//!
//! The session is opened lazily on the first turn and kept until
//! [`ChatSessionManager::shutdown`].

use std::sync::Arc;

use postcraft_core::types::FinalizedPost;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::parser::ResponseParser;
use crate::session::{ChatService, ChatSession};

/// Result of one successful turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    /// The model's reply, verbatim.
    pub display_text: String,
    /// Present when the reply carried a decodable finalized post.
    pub finalized_post: Option<FinalizedPost>,
}

/// Forwards user turns to a single chat session.
pub struct ChatSessionManager {
    service: Arc<dyn ChatService>,
    directive: String,
    parser: ResponseParser,
    session: Option<Box<dyn ChatSession>>,
    max_message_length: usize,
}

impl ChatSessionManager {
    pub fn new(
        service: Arc<dyn ChatService>,
        directive: impl Into<String>,
        max_message_length: usize,
    ) -> Self {
        Self {
            service,
            directive: directive.into(),
            parser: ResponseParser::new(),
            session: None,
            max_message_length,
        }
    }

    /// Check a message without sending it.
    pub fn validate(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }

    /// Send one user turn and parse the reply.
    pub async fn send_turn(&mut self, text: &str) -> Result<TurnReply, ChatError> {
        self.validate(text)?;

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                let session = self.service.create_session(&self.directive).await?;
                info!(service = self.service.name(), "Chat session started");
                self.session.insert(session)
            }
        };

        let reply = match session.send(text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                return Err(e);
            }
        };
        debug!(
            reply_len = reply.len(),
            history = session.history_len(),
            "Chat turn completed"
        );

        let finalized_post = self.parser.parse(&reply);
        Ok(TurnReply {
            display_text: reply,
            finalized_post,
        })
    }

    /// Drop the session. The next turn opens a fresh one.
    pub fn shutdown(&mut self) {
        if self.session.take().is_some() {
            info!("Chat session closed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Messages held by the current session, zero when inactive.
    pub fn history_len(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.history_len())
    }
}
