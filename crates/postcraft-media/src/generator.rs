//! The contract shared by the image and video paths.

use async_trait::async_trait;
use postcraft_core::types::{MediaArtifact, MediaKind};

use crate::error::GenerationError;

/// Turns a prompt into a finished artifact of one kind.
#[async_trait]
pub trait MediaGenerator: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Run one complete attempt. No retries.
    async fn generate(&self, prompt: &str) -> Result<MediaArtifact, GenerationError>;
}
