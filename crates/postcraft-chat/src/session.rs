//! Chat service and session traits, plus a scripted mock.
//!
//! A [`ChatService`] opens sessions; a [`ChatSession`] owns the history of
//! one conversation and replays it on every send.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ChatError;

/// Backend that can open chat sessions with a fixed system directive.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open a new session. The directive is applied to every turn of it.
    async fn create_session(&self, directive: &str) -> Result<Box<dyn ChatSession>, ChatError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}

/// One ongoing conversation.
#[async_trait]
pub trait ChatSession: Send {
    /// Send a user message and return the reply text.
    ///
    /// On success both the message and the reply join the session history;
    /// on failure the history is left unchanged.
    async fn send(&mut self, message: &str) -> Result<String, ChatError>;

    /// Number of messages (user and model) in the history.
    fn history_len(&self) -> usize;
}

// ---------------------------------------------------------------------------
// MockChatService - scripted replies for tests
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MockScript {
    replies: Mutex<VecDeque<Result<String, String>>>,
    sent: Mutex<Vec<String>>,
    directives: Mutex<Vec<String>>,
    sessions_created: AtomicUsize,
}

/// Chat service whose sessions answer from a shared script.
///
/// Each scripted entry is consumed by one `send`. `Err` entries fail the
/// send with [`ChatError::Service`]. An exhausted script fails too.
#[derive(Debug, Clone, Default)]
pub struct MockChatService {
    script: Arc<MockScript>,
}

impl MockChatService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Ok(reply.into()));
        self
    }

    /// Queue a failed send.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock_replies().push_back(Err(message.into()));
        self
    }

    /// Messages received across all sessions, in order.
    pub fn sent_messages(&self) -> Vec<String> {
        self.script
            .sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Directives passed to `create_session`, in order.
    pub fn directives(&self) -> Vec<String> {
        self.script
            .directives
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.script.sessions_created.load(Ordering::SeqCst)
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, String>>> {
        self.script.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatService for MockChatService {
    async fn create_session(&self, directive: &str) -> Result<Box<dyn ChatSession>, ChatError> {
        self.script.sessions_created.fetch_add(1, Ordering::SeqCst);
        self.script
            .directives
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(directive.to_string());
        Ok(Box::new(MockChatSession {
            script: Arc::clone(&self.script),
            history: Vec::new(),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockChatSession {
    script: Arc<MockScript>,
    history: Vec<String>,
}

#[async_trait]
impl ChatSession for MockChatSession {
    async fn send(&mut self, message: &str) -> Result<String, ChatError> {
        self.script
            .sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());

        let next = self
            .script
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Ok(reply)) => {
                self.history.push(message.to_string());
                self.history.push(reply.clone());
                Ok(reply)
            }
            Some(Err(msg)) => Err(ChatError::Service(msg)),
            None => Err(ChatError::Service("mock script exhausted".to_string())),
        }
    }

    fn history_len(&self) -> usize {
        self.history.len()
    }
}
