//! Ties the session manager to the shared store.
//!
//! A submitted message is recorded as a user turn, sent, and answered with
//! either the model's reply or the fixed failure turn. A reply carrying a
//! finalized post replaces the store's post.

use postcraft_core::store::{lock_store, SharedStore};
use postcraft_core::types::{ConversationTurn, FinalizedPost};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::ChatError;
use crate::manager::ChatSessionManager;

/// What one submission added to the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub user_turn: ConversationTurn,
    pub reply_turn: ConversationTurn,
    pub finalized_post: Option<FinalizedPost>,
}

/// The chat path: one manager, one store.
pub struct Conversation {
    manager: Mutex<ChatSessionManager>,
    store: SharedStore,
}

impl Conversation {
    pub fn new(manager: ChatSessionManager, store: SharedStore) -> Self {
        Self {
            manager: Mutex::new(manager),
            store,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Submit a user message.
    ///
    /// Invalid input is rejected before anything is recorded. A failed
    /// service call is not an error here: it yields the error-flagged
    /// assistant turn.
    pub async fn submit(&self, text: &str) -> Result<TurnOutcome, ChatError> {
        // Held across the send so turns never interleave.
        let mut manager = self.manager.lock().await;
        manager.validate(text)?;

        let user_turn = ConversationTurn::user(text);
        lock_store(&self.store)?.append_turn(user_turn.clone());

        match manager.send_turn(text).await {
            Ok(reply) => {
                let reply_turn = ConversationTurn::assistant(reply.display_text);
                let mut store = lock_store(&self.store)?;
                store.append_turn(reply_turn.clone());
                if let Some(post) = &reply.finalized_post {
                    let epoch = store.set_finalized_post(post.clone());
                    info!(epoch, "Post finalized");
                }
                Ok(TurnOutcome {
                    user_turn,
                    reply_turn,
                    finalized_post: reply.finalized_post,
                })
            }
            Err(e) if e.is_invalid_input() => Err(e),
            Err(e) => {
                warn!(error = %e, "Recording chat failure turn");
                let reply_turn = ConversationTurn::service_failure();
                lock_store(&self.store)?.append_turn(reply_turn.clone());
                Ok(TurnOutcome {
                    user_turn,
                    reply_turn,
                    finalized_post: None,
                })
            }
        }
    }

    pub async fn is_active(&self) -> bool {
        self.manager.lock().await.is_active()
    }

    /// Close the chat session.
    pub async fn shutdown(&self) {
        self.manager.lock().await.shutdown();
    }
}
