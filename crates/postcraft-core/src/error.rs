use thiserror::Error;

use crate::types::{MediaKind, MediaStatus};

/// Top-level error type for Postcraft.
///
/// Subsystem crates define their own error types for their own failure
/// modes; this enum covers configuration, I/O and serialization, which every
/// crate shares.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PostcraftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid artifact: {0}")]
    Artifact(String),
}

impl From<toml::de::Error> for PostcraftError {
    fn from(err: toml::de::Error) -> Self {
        PostcraftError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PostcraftError {
    fn from(err: toml::ser::Error) -> Self {
        PostcraftError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PostcraftError {
    fn from(err: serde_json::Error) -> Self {
        PostcraftError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Postcraft core operations.
pub type Result<T> = std::result::Result<T, PostcraftError>;

/// Errors from the conversation/media state store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid {kind} status transition: {from} -> {to}")]
    InvalidTransition {
        kind: MediaKind,
        from: MediaStatus,
        to: MediaStatus,
    },
    #[error("{0} can only succeed together with an artifact")]
    ArtifactRequired(MediaKind),
    #[error("No finalized post to generate media for")]
    NoFinalizedPost,
    #[error("State lock poisoned")]
    LockPoisoned,
}

/// Errors from resolving the API credential.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No API key configured (select one or set {0})")]
    Missing(String),
    #[error("API key must not be empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostcraftError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PostcraftError = io_err.into();
        assert!(matches!(err, PostcraftError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: PostcraftError = err.unwrap_err().into();
        assert!(matches!(err, PostcraftError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: PostcraftError = err.unwrap_err().into();
        assert!(matches!(err, PostcraftError::Serialization(_)));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::InvalidTransition {
            kind: MediaKind::Video,
            from: MediaStatus::Idle,
            to: MediaStatus::Failed,
        };
        assert_eq!(
            err.to_string(),
            "Invalid video status transition: idle -> failed"
        );

        let err = StoreError::ArtifactRequired(MediaKind::Image);
        assert_eq!(
            err.to_string(),
            "image can only succeed together with an artifact"
        );
    }

    #[test]
    fn test_credential_error_display() {
        let err = CredentialError::Missing("GEMINI_API_KEY".to_string());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert_eq!(CredentialError::Empty.to_string(), "API key must not be empty");
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
