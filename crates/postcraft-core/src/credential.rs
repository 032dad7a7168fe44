//! API key resolution.
//!
//! The key is looked up on every request rather than captured at startup,
//! so a key selected at runtime (or exported after launch) takes effect on
//! the next call.

use std::sync::RwLock;

use serde::Serialize;
use tracing::info;

use crate::error::CredentialError;

/// Where the active key came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Selected at runtime through the API.
    Selected,
    /// Read from the named environment variable.
    Environment(String),
}

/// Holds an optionally selected key and falls back to environment variables.
#[derive(Debug)]
pub struct CredentialStore {
    selected: RwLock<Option<String>>,
    env_vars: Vec<String>,
}

impl CredentialStore {
    /// Create a store that consults `env_vars` in order.
    pub fn new(env_vars: Vec<String>) -> Self {
        Self {
            selected: RwLock::new(None),
            env_vars,
        }
    }

    /// Create a store with a fixed key and no environment fallback.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            selected: RwLock::new(Some(key.into())),
            env_vars: Vec::new(),
        }
    }

    /// Select a key at runtime; it takes precedence over the environment.
    pub fn select(&self, key: &str) -> Result<(), CredentialError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        let mut guard = self.selected.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(key.to_string());
        info!("API key selected at runtime");
        Ok(())
    }

    /// Forget the runtime-selected key.
    pub fn clear(&self) {
        let mut guard = self.selected.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Resolve the key to use for the next request.
    pub fn resolve(&self) -> Result<String, CredentialError> {
        self.lookup()
            .map(|(key, _)| key)
            .ok_or_else(|| CredentialError::Missing(self.env_vars.join(" or ")))
    }

    /// Whether a key is currently available.
    pub fn is_configured(&self) -> bool {
        self.lookup().is_some()
    }

    /// Where the key would come from, if any.
    pub fn source(&self) -> Option<CredentialSource> {
        self.lookup().map(|(_, source)| source)
    }

    fn lookup(&self) -> Option<(String, CredentialSource)> {
        let selected = self
            .selected
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(key) = selected {
            return Some((key, CredentialSource::Selected));
        }
        self.env_vars.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (value, CredentialSource::Environment(name.clone())))
        })
    }
}
