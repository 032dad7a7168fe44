//! Error types for the chat path.

use postcraft_core::error::{CredentialError, StoreError};

/// Errors from the chat session manager and its backends.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("chat service error: {0}")]
    Service(String),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("state error: {0}")]
    State(#[from] StoreError),
}

impl ChatError {
    /// Rejections of the user's input, as opposed to failures talking to
    /// the chat service.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ChatError::EmptyMessage | ChatError::MessageTooLong(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Service(err.to_string())
    }
}
