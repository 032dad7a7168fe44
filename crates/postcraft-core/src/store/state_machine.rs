//! Media job state machine with validated transitions.
//!
//! Idle/Failed/Succeeded -> Pending -> Succeeded/Failed
//!
//! The reset back to Idle is not a transition: it happens only when a new
//! finalized post replaces the old one.

use crate::error::StoreError;
use crate::types::{MediaKind, MediaStatus};

/// Validate that a media status transition is allowed.
///
/// Valid transitions:
/// - Idle -> Pending
/// - Failed -> Pending (retry)
/// - Succeeded -> Pending (regenerate)
/// - Pending -> Succeeded
/// - Pending -> Failed
pub fn validate_transition(
    kind: MediaKind,
    from: MediaStatus,
    to: MediaStatus,
) -> Result<(), StoreError> {
    let valid = matches!(
        (from, to),
        (MediaStatus::Idle, MediaStatus::Pending)
            | (MediaStatus::Failed, MediaStatus::Pending)
            | (MediaStatus::Succeeded, MediaStatus::Pending)
            | (MediaStatus::Pending, MediaStatus::Succeeded)
            | (MediaStatus::Pending, MediaStatus::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition { kind, from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: MediaKind = MediaKind::Image;

    // =====================================================================
    // Valid transitions
    // =====================================================================

    #[test]
    fn test_idle_to_pending() {
        assert!(validate_transition(K, MediaStatus::Idle, MediaStatus::Pending).is_ok());
    }

    #[test]
    fn test_failed_to_pending_is_retry() {
        assert!(validate_transition(K, MediaStatus::Failed, MediaStatus::Pending).is_ok());
    }

    #[test]
    fn test_succeeded_to_pending_is_regenerate() {
        assert!(validate_transition(K, MediaStatus::Succeeded, MediaStatus::Pending).is_ok());
    }

    #[test]
    fn test_pending_to_terminal() {
        assert!(validate_transition(K, MediaStatus::Pending, MediaStatus::Succeeded).is_ok());
        assert!(validate_transition(K, MediaStatus::Pending, MediaStatus::Failed).is_ok());
    }

    // =====================================================================
    // Invalid transitions
    // =====================================================================

    #[test]
    fn test_pending_to_pending_invalid() {
        assert!(validate_transition(K, MediaStatus::Pending, MediaStatus::Pending).is_err());
    }

    #[test]
    fn test_idle_to_terminal_invalid() {
        assert!(validate_transition(K, MediaStatus::Idle, MediaStatus::Succeeded).is_err());
        assert!(validate_transition(K, MediaStatus::Idle, MediaStatus::Failed).is_err());
    }

    #[test]
    fn test_nothing_returns_to_idle() {
        for from in [
            MediaStatus::Idle,
            MediaStatus::Pending,
            MediaStatus::Succeeded,
            MediaStatus::Failed,
        ] {
            assert!(validate_transition(K, from, MediaStatus::Idle).is_err());
        }
    }

    #[test]
    fn test_terminal_to_terminal_invalid() {
        assert!(validate_transition(K, MediaStatus::Failed, MediaStatus::Succeeded).is_err());
        assert!(validate_transition(K, MediaStatus::Succeeded, MediaStatus::Failed).is_err());
    }

    #[test]
    fn test_invalid_transition_error_names_kind_and_states() {
        let err =
            validate_transition(MediaKind::Video, MediaStatus::Idle, MediaStatus::Failed)
                .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("video"));
        assert!(msg.contains("idle"));
        assert!(msg.contains("failed"));
    }

    #[test]
    fn test_all_valid_transitions_count() {
        let all = [
            MediaStatus::Idle,
            MediaStatus::Pending,
            MediaStatus::Succeeded,
            MediaStatus::Failed,
        ];

        let mut valid_count = 0;
        for from in &all {
            for to in &all {
                if validate_transition(K, *from, *to).is_ok() {
                    valid_count += 1;
                }
            }
        }
        assert_eq!(valid_count, 5, "Expected exactly 5 valid transitions");
    }
}
