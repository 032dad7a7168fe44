//! Finalized-post extraction from free-form model replies.
//!
//! The strategist is instructed to wrap a finalized post in a fenced
//! ```` ```json ```` block. The first such block holding a JSON object is
//! decoded into a [`FinalizedPost`]; everything else in the reply is left
//! alone and shown to the user as-is.

use std::sync::LazyLock;

use postcraft_core::types::FinalizedPost;
use regex::Regex;
use tracing::{debug, warn};

// Lazy body so the match stops at the first closing fence.
static JSON_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json\s*(\{[\s\S]*?\})\s*```").expect("Invalid JSON block regex")
});

/// Extracts [`FinalizedPost`]s from assistant replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Return the body of the first fenced JSON object block, if any.
    pub fn extract_block<'a>(&self, text: &'a str) -> Option<&'a str> {
        JSON_BLOCK_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Parse the finalized post out of a reply.
    ///
    /// Returns `None` when there is no block, or when the block is not valid
    /// JSON or lacks a required field. Decode failures are logged and
    /// otherwise swallowed.
    pub fn parse(&self, text: &str) -> Option<FinalizedPost> {
        let block = self.extract_block(text)?;
        match serde_json::from_str::<FinalizedPost>(block) {
            Ok(post) => {
                debug!(
                    status = %post.status,
                    hashtags = post.hashtags.len(),
                    "Finalized post parsed from reply"
                );
                Some(post)
            }
            Err(e) => {
                warn!(error = %e, block_len = block.len(), "Failed to parse JSON from model response");
                None
            }
        }
    }
}
