use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PostcraftError;

/// Text shown in place of a reply when the chat service call fails.
pub const CHAT_FAILURE_TEXT: &str = "Sorry, I encountered an error. Please try again.";

// =============================================================================
// Conversation
// =============================================================================

/// Who authored a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the conversation. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(role: Role, text: impl Into<String>, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            is_error,
            created_at: Utc::now(),
        }
    }

    /// A turn typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text, false)
    }

    /// A reply from the chat service, shown verbatim.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text, false)
    }

    /// The error-flagged assistant turn recorded when a chat call fails.
    pub fn service_failure() -> Self {
        Self::new(Role::Assistant, CHAT_FAILURE_TEXT, true)
    }
}

// =============================================================================
// Finalized post
// =============================================================================

/// The structured post the strategist emits when a post is finalized.
///
/// Field names on the wire follow the JSON contract given to the model
/// (`content_caption`, `image_prompt`, ...). Every field is required; the
/// `status` value is carried as-is and never validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedPost {
    pub status: String,
    #[serde(rename = "content_caption")]
    pub caption: String,
    pub hashtags: Vec<String>,
    pub image_prompt: String,
    pub video_prompt: String,
}

impl FinalizedPost {
    /// The generation prompt for the given media kind.
    pub fn prompt_for(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => &self.image_prompt,
            MediaKind::Video => &self.video_prompt,
        }
    }
}

// =============================================================================
// Media
// =============================================================================

/// The two kinds of media a post can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Image, MediaKind::Video];

    /// Fixed message shown inline when a job of this kind fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            MediaKind::Image => "Failed to generate image. Try again.",
            MediaKind::Video => "Failed to generate video. Ensure you have a paid key selected.",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(format!("Unknown media kind: {}", s)),
        }
    }
}

/// Lifecycle status of the media job for one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaStatus::Idle => write!(f, "idle"),
            MediaStatus::Pending => write!(f, "pending"),
            MediaStatus::Succeeded => write!(f, "succeeded"),
            MediaStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for MediaStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(MediaStatus::Idle),
            "pending" => Ok(MediaStatus::Pending),
            "succeeded" => Ok(MediaStatus::Succeeded),
            "failed" => Ok(MediaStatus::Failed),
            _ => Err(format!("Unknown media status: {}", s)),
        }
    }
}

/// A generated media file that can be handed to a viewer.
#[derive(Clone, PartialEq, Eq)]
pub enum MediaArtifact {
    /// `data:<mime>;base64,<payload>` URI, as returned for inline images.
    DataUri(String),
    /// Bytes downloaded from a remote locator and held in memory.
    Blob { mime_type: String, bytes: Vec<u8> },
}

impl MediaArtifact {
    /// Build a data URI artifact from an already base64-encoded payload.
    pub fn data_uri(mime_type: &str, base64_payload: &str) -> Self {
        MediaArtifact::DataUri(format!("data:{};base64,{}", mime_type, base64_payload))
    }

    pub fn mime_type(&self) -> &str {
        match self {
            MediaArtifact::DataUri(uri) => uri
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .unwrap_or("application/octet-stream"),
            MediaArtifact::Blob { mime_type, .. } => mime_type,
        }
    }

    /// Decode the artifact into raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PostcraftError> {
        match self {
            MediaArtifact::DataUri(uri) => {
                let (_, payload) = uri.split_once(";base64,").ok_or_else(|| {
                    PostcraftError::Artifact("data URI is not base64-encoded".to_string())
                })?;
                BASE64
                    .decode(payload.as_bytes())
                    .map_err(|e| PostcraftError::Artifact(e.to_string()))
            }
            MediaArtifact::Blob { bytes, .. } => Ok(bytes.clone()),
        }
    }

    /// A serializable summary without the payload.
    pub fn info(&self) -> ArtifactInfo {
        let size_bytes = match self {
            MediaArtifact::DataUri(uri) => uri
                .split_once(";base64,")
                .map(|(_, payload)| payload.len() / 4 * 3)
                .unwrap_or(0),
            MediaArtifact::Blob { bytes, .. } => bytes.len(),
        };
        ArtifactInfo {
            mime_type: self.mime_type().to_string(),
            size_bytes,
        }
    }
}

// Payloads run to megabytes; keep them out of debug output and logs.
impl fmt::Debug for MediaArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaArtifact::DataUri(uri) => f
                .debug_struct("DataUri")
                .field("mime_type", &self.mime_type())
                .field("len", &uri.len())
                .finish(),
            MediaArtifact::Blob { mime_type, bytes } => f
                .debug_struct("Blob")
                .field("mime_type", mime_type)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Payload-free description of an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub mime_type: String,
    /// Approximate for data URIs (derived from the base64 length).
    pub size_bytes: usize,
}

/// Status and artifact of one media kind, held together so that an artifact
/// exists exactly when the job succeeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MediaSlot {
    #[default]
    Idle,
    Pending,
    Succeeded(MediaArtifact),
    Failed(String),
}

impl MediaSlot {
    pub fn status(&self) -> MediaStatus {
        match self {
            MediaSlot::Idle => MediaStatus::Idle,
            MediaSlot::Pending => MediaStatus::Pending,
            MediaSlot::Succeeded(_) => MediaStatus::Succeeded,
            MediaSlot::Failed(_) => MediaStatus::Failed,
        }
    }

    pub fn artifact(&self) -> Option<&MediaArtifact> {
        match self {
            MediaSlot::Succeeded(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MediaSlot::Pending)
    }

    pub fn view(&self) -> MediaSlotView {
        MediaSlotView {
            status: self.status(),
            message: match self {
                MediaSlot::Failed(message) => Some(message.clone()),
                _ => None,
            },
            artifact: self.artifact().map(MediaArtifact::info),
        }
    }
}

/// Serializable view of a [`MediaSlot`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSlotView {
    pub status: MediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactInfo>,
}
