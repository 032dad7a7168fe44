//! Error types for media generation.

use postcraft_core::error::CredentialError;
use postcraft_core::types::MediaKind;

/// Why a generation attempt produced no artifact.
///
/// None of these are retried; the slot goes to `failed` and the user may
/// start the job again.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service error: {0}")]
    Service(String),
    #[error("no media data in response: {0}")]
    MissingData(String),
    #[error("generation job failed: {0}")]
    JobFailed(String),
    #[error("artifact download failed: {0}")]
    Download(String),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("{slot} slot given a generator that produces {produces}")]
    WrongKind { slot: MediaKind, produces: MediaKind },
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Service(err.to_string())
    }
}
