use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PostcraftError, Result};

/// Top-level configuration for the Postcraft service.
///
/// Loaded from `~/.postcraft/config.toml` by default. Every section falls
/// back to its defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostcraftConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

impl PostcraftConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PostcraftConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values no request could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.api.port == 0 {
            return Err(PostcraftError::Config("api.port must be non-zero".into()));
        }
        if self.gemini.api_base.trim().is_empty() {
            return Err(PostcraftError::Config("gemini.api_base must be set".into()));
        }
        for (section, model) in [
            ("chat", &self.chat.model),
            ("image", &self.image.model),
            ("video", &self.video.model),
        ] {
            if model.trim().is_empty() {
                return Err(PostcraftError::Config(format!(
                    "{}.model must be set",
                    section
                )));
            }
        }
        if self.video.poll_interval_secs == 0 {
            return Err(PostcraftError::Config(
                "video.poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.video.sample_count == 0 {
            return Err(PostcraftError::Config(
                "video.sample_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Local HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of the state event broadcast channel.
    pub event_buffer: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3040,
            event_buffer: 256,
        }
    }
}

/// Connection settings shared by the chat, image and video backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_base: String,
    /// Environment variables consulted, in order, for the API key.
    pub api_key_env: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()],
            request_timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Build `{api_base}/models/{model}:{method}`.
    ///
    /// Accepts model names with or without the `models/` prefix.
    pub fn model_endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{}", trimmed)
        };
        format!(
            "{}/{}:{}",
            self.api_base.trim().trim_end_matches('/'),
            model_path,
            method
        )
    }

    /// Build `{api_base}/{resource}` for operation names like
    /// `models/veo/operations/abc`.
    pub fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim().trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    /// Maximum user message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            max_message_length: 4000,
        }
    }
}

/// Image generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub model: String,
    pub aspect_ratio: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-image".to_string(),
            aspect_ratio: "1:1".to_string(),
        }
    }
}

/// Video generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub model: String,
    pub resolution: String,
    /// Vertical by default, for mobile feeds.
    pub aspect_ratio: String,
    pub sample_count: u32,
    pub poll_interval_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: "veo-3.1-fast-generate-preview".to_string(),
            resolution: "720p".to_string(),
            aspect_ratio: "9:16".to_string(),
            sample_count: 1,
            poll_interval_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PostcraftConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.api.port, 3040);
        assert_eq!(config.chat.model, "gemini-2.5-flash");
        assert_eq!(config.image.aspect_ratio, "1:1");
        assert_eq!(config.video.resolution, "720p");
        assert_eq!(config.video.aspect_ratio, "9:16");
        assert_eq!(config.video.sample_count, 1);
        assert_eq!(config.video.poll_interval_secs, 5);
        assert_eq!(
            config.gemini.api_key_env,
            vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: PostcraftConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.port, 3040);
        assert_eq!(config.video.model, "veo-3.1-fast-generate-preview");
    }

    #[test]
    fn test_partial_section_overrides() {
        let config: PostcraftConfig = toml::from_str(
            r#"
            [video]
            poll_interval_secs = 10

            [api]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.video.poll_interval_secs, 10);
        assert_eq!(config.video.resolution, "720p");
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.api.host, "127.0.0.1");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PostcraftConfig::default();
        config.chat.model = "gemini-2.5-pro".to_string();
        config.api.port = 4000;
        config.save(&path).unwrap();

        let loaded = PostcraftConfig::load(&path).unwrap();
        assert_eq!(loaded.chat.model, "gemini-2.5-pro");
        assert_eq!(loaded.api.port, 4000);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = PostcraftConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, PostcraftError::Io(_)));
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        let config = PostcraftConfig::load_or_default(&path);
        assert_eq!(config.api.port, 3040);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[video]\npoll_interval_secs = 0\n").unwrap();
        let err = PostcraftConfig::load(&path).unwrap_err();
        assert!(matches!(err, PostcraftError::Config(_)));
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut config = PostcraftConfig::default();
        config.image.model = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("image.model"));
    }

    #[test]
    fn test_validate_rejects_zero_port_and_samples() {
        let mut config = PostcraftConfig::default();
        config.api.port = 0;
        assert!(config.validate().is_err());

        let mut config = PostcraftConfig::default();
        config.video.sample_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_endpoint() {
        let gemini = GeminiConfig::default();
        assert_eq!(
            gemini.model_endpoint("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            gemini.model_endpoint("models/veo-3.1-fast-generate-preview", "predictLongRunning"),
            "https://generativelanguage.googleapis.com/v1beta/models/veo-3.1-fast-generate-preview:predictLongRunning"
        );
    }

    #[test]
    fn test_resource_url_trims_slashes() {
        let gemini = GeminiConfig {
            api_base: "http://localhost:9000/v1beta/".to_string(),
            ..GeminiConfig::default()
        };
        assert_eq!(
            gemini.resource_url("/models/veo/operations/abc"),
            "http://localhost:9000/v1beta/models/veo/operations/abc"
        );
    }
}
