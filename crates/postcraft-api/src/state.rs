//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use postcraft_chat::{ChatService, ChatSessionManager, Conversation, STRATEGIST_DIRECTIVE};
use postcraft_core::config::PostcraftConfig;
use postcraft_core::credential::CredentialStore;
use postcraft_core::events::StateEvent;
use postcraft_core::store::{PostStore, SharedStore};
use postcraft_media::{GenerationError, MediaController, MediaGenerator};
use tokio::sync::{broadcast, watch};

/// Shared application state.
///
/// All fields are cheap to clone; mutable state sits behind the store's
/// mutex and the conversation's async mutex.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PostcraftConfig>,
    pub store: SharedStore,
    pub conversation: Arc<Conversation>,
    pub media: MediaController,
    pub credentials: Arc<CredentialStore>,
    /// Receives every store mutation; feeds `/events`.
    pub event_tx: broadcast::Sender<StateEvent>,
    pub start_time: Instant,
    /// Flips to `true` once the server starts shutting down; open event
    /// streams end on it.
    shutdown: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Wire a fresh store, conversation and media controller around the
    /// given backends. Fails when a media generator sits in the wrong slot.
    pub fn new(
        config: PostcraftConfig,
        chat: Arc<dyn ChatService>,
        image: Arc<dyn MediaGenerator>,
        video: Arc<dyn MediaGenerator>,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, GenerationError> {
        let (event_tx, _) = broadcast::channel(config.api.event_buffer.max(1));
        let store = PostStore::new().with_events(event_tx.clone()).into_shared();

        let manager =
            ChatSessionManager::new(chat, STRATEGIST_DIRECTIVE, config.chat.max_message_length);
        let conversation = Arc::new(Conversation::new(manager, store.clone()));
        let media = MediaController::new(store.clone(), image, video)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            conversation,
            media,
            credentials,
            event_tx,
            start_time: Instant::now(),
            shutdown: Arc::new(watch::channel(false).0),
        })
    }

    /// Tell long-lived responses to finish. Idempotent.
    pub fn trigger_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}
