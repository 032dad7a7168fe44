//! Shared building blocks for Postcraft.
//!
//! Configuration, error types, the conversation/media data model, the
//! in-memory state store, state events, the API credential store, and the
//! serde wire types for the Gemini REST surface.

pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod gemini;
pub mod store;
pub mod types;

pub use config::PostcraftConfig;
pub use credential::{CredentialSource, CredentialStore};
pub use error::{CredentialError, PostcraftError, Result, StoreError};
pub use events::StateEvent;
pub use store::{PostStore, SharedStore, StoreSnapshot};
pub use types::*;
