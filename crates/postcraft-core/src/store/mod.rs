//! Conversation and media state.
//!
//! Holds the message history, the current finalized post and one media
//! slot per kind. Every mutation emits a [`StateEvent`] when an event
//! channel is attached.

pub mod state_machine;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StoreError;
use crate::events::StateEvent;
use crate::store::state_machine::validate_transition;
use crate::types::{
    ConversationTurn, FinalizedPost, MediaArtifact, MediaKind, MediaSlot, MediaSlotView,
    MediaStatus,
};

/// The store as shared between the chat path, media jobs and the API.
pub type SharedStore = Arc<Mutex<PostStore>>;

/// Lock a shared store, mapping poisoning to [`StoreError::LockPoisoned`].
pub fn lock_store(store: &SharedStore) -> Result<MutexGuard<'_, PostStore>, StoreError> {
    store.lock().map_err(|_| StoreError::LockPoisoned)
}

/// In-memory conversation/media state.
#[derive(Debug, Default)]
pub struct PostStore {
    turns: Vec<ConversationTurn>,
    post: Option<FinalizedPost>,
    image: MediaSlot,
    video: MediaSlot,
    post_epoch: u64,
    events: Option<broadcast::Sender<StateEvent>>,
}

impl PostStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a broadcast channel that receives every state change.
    pub fn with_events(mut self, events: broadcast::Sender<StateEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Wrap the store for sharing.
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Append a turn to the conversation.
    pub fn append_turn(&mut self, turn: ConversationTurn) {
        self.emit(StateEvent::TurnAppended {
            turn_id: turn.id,
            role: turn.role,
            is_error: turn.is_error,
            timestamp: Utc::now(),
        });
        self.turns.push(turn);
    }

    /// Replace the finalized post.
    ///
    /// Both media slots go back to idle and their artifacts are dropped,
    /// whatever state they were in. Returns the new post epoch.
    pub fn set_finalized_post(&mut self, post: FinalizedPost) -> u64 {
        self.post = Some(post);
        self.image = MediaSlot::Idle;
        self.video = MediaSlot::Idle;
        self.post_epoch += 1;
        debug!(epoch = self.post_epoch, "Finalized post replaced");

        let now = Utc::now();
        self.emit(StateEvent::PostFinalized {
            epoch: self.post_epoch,
            timestamp: now,
        });
        for kind in MediaKind::ALL {
            self.emit(StateEvent::MediaStatusChanged {
                kind,
                status: MediaStatus::Idle,
                timestamp: now,
            });
        }
        self.post_epoch
    }

    /// Move a media slot to `pending` or `failed`.
    ///
    /// `succeeded` is only reachable through [`set_media_artifact`], and
    /// `idle` only through [`set_finalized_post`].
    ///
    /// [`set_media_artifact`]: PostStore::set_media_artifact
    /// [`set_finalized_post`]: PostStore::set_finalized_post
    pub fn set_media_status(
        &mut self,
        kind: MediaKind,
        status: MediaStatus,
    ) -> Result<(), StoreError> {
        if status == MediaStatus::Succeeded {
            return Err(StoreError::ArtifactRequired(kind));
        }
        let current = self.slot(kind).status();
        validate_transition(kind, current, status)?;

        *self.slot_mut(kind) = match status {
            MediaStatus::Pending => MediaSlot::Pending,
            MediaStatus::Failed => MediaSlot::Failed(kind.failure_message().to_string()),
            MediaStatus::Idle | MediaStatus::Succeeded => {
                return Err(StoreError::InvalidTransition {
                    kind,
                    from: current,
                    to: status,
                })
            }
        };
        self.emit(StateEvent::MediaStatusChanged {
            kind,
            status,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Record a finished artifact; the slot becomes `succeeded`.
    pub fn set_media_artifact(
        &mut self,
        kind: MediaKind,
        artifact: MediaArtifact,
    ) -> Result<(), StoreError> {
        let current = self.slot(kind).status();
        validate_transition(kind, current, MediaStatus::Succeeded)?;
        *self.slot_mut(kind) = MediaSlot::Succeeded(artifact);
        self.emit(StateEvent::MediaStatusChanged {
            kind,
            status: MediaStatus::Succeeded,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn finalized_post(&self) -> Option<&FinalizedPost> {
        self.post.as_ref()
    }

    pub fn media(&self, kind: MediaKind) -> &MediaSlot {
        self.slot(kind)
    }

    /// Incremented on every new finalized post.
    pub fn post_epoch(&self) -> u64 {
        self.post_epoch
    }

    /// Serializable copy of the current state, without artifact payloads.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            turns: self.turns.clone(),
            finalized_post: self.post.clone(),
            media: MediaSnapshot {
                image: self.image.view(),
                video: self.video.view(),
            },
            post_epoch: self.post_epoch,
        }
    }

    fn slot(&self, kind: MediaKind) -> &MediaSlot {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
        }
    }

    fn slot_mut(&mut self, kind: MediaKind) -> &mut MediaSlot {
        match kind {
            MediaKind::Image => &mut self.image,
            MediaKind::Video => &mut self.video,
        }
    }

    fn emit(&self, event: StateEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }
}

/// Serializable snapshot of the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub turns: Vec<ConversationTurn>,
    pub finalized_post: Option<FinalizedPost>,
    pub media: MediaSnapshot,
    pub post_epoch: u64,
}

/// Per-kind media views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    pub image: MediaSlotView,
    pub video: MediaSlotView,
}
