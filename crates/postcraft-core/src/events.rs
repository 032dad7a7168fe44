use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{MediaKind, MediaStatus, Role};

/// State changes emitted by the [`PostStore`](crate::store::PostStore).
///
/// Consumed by the SSE broadcast channel so a view can follow chat replies
/// and media jobs without polling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateEvent {
    /// A turn was appended to the conversation.
    TurnAppended {
        turn_id: Uuid,
        role: Role,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },

    /// A new finalized post replaced the previous one; both media slots
    /// are idle again.
    PostFinalized { epoch: u64, timestamp: DateTime<Utc> },

    /// The status of one media kind changed.
    MediaStatusChanged {
        kind: MediaKind,
        status: MediaStatus,
        timestamp: DateTime<Utc>,
    },
}

impl StateEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            StateEvent::TurnAppended { timestamp, .. }
            | StateEvent::PostFinalized { timestamp, .. }
            | StateEvent::MediaStatusChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the event name used for logging and SSE.
    pub fn event_name(&self) -> &'static str {
        match self {
            StateEvent::TurnAppended { .. } => "turn_appended",
            StateEvent::PostFinalized { .. } => "post_finalized",
            StateEvent::MediaStatusChanged { .. } => "media_status_changed",
        }
    }
}
