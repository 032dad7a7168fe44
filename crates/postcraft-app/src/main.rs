//! Postcraft application binary - composition root.
//!
//! 1. Load configuration from TOML and apply command-line overrides
//! 2. Build the Gemini chat, image and video backends
//! 3. Wire the store, conversation and media controller into the API state
//! 4. Serve the API until Ctrl-C, then close the chat session

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use postcraft_api::{routes, AppState};
use postcraft_chat::GeminiChatService;
use postcraft_core::config::PostcraftConfig;
use postcraft_core::credential::CredentialStore;
use postcraft_media::{
    GeminiImageBackend, GeminiVideoBackend, ImageGenerator, VideoGenerator,
};

/// Social post strategist backed by Gemini.
#[derive(Debug, Parser)]
#[command(name = "postcraft", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the API bind address.
    #[arg(long)]
    host: Option<String>,
}

/// Resolve the config file path (POSTCRAFT_CONFIG env, or ~/.postcraft/config.toml).
fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("POSTCRAFT_CONFIG") {
        return PathBuf::from(p);
    }
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".postcraft").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".postcraft").join("config.toml");
    }
    PathBuf::from("config.toml")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Config.
    let config_file = cli.config.clone().unwrap_or_else(config_path);
    let mut config = PostcraftConfig::load_or_default(&config_file);
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if let Some(host) = cli.host {
        config.api.host = host;
    }

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Postcraft v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Credential.
    let credentials = Arc::new(CredentialStore::new(config.gemini.api_key_env.clone()));
    match credentials.source() {
        Some(source) => tracing::info!(?source, "API key available"),
        None => tracing::warn!(
            env = ?config.gemini.api_key_env,
            "No API key found; select one with POST /credential"
        ),
    }

    // Backends.
    let chat = GeminiChatService::new(&config.gemini, &config.chat, Arc::clone(&credentials))?;
    let image = GeminiImageBackend::new(&config.gemini, &config.image, Arc::clone(&credentials))?;
    let video = GeminiVideoBackend::new(&config.gemini, &config.video, Arc::clone(&credentials))?;
    tracing::info!(
        chat = %config.chat.model,
        image = %config.image.model,
        video = %config.video.model,
        "Gemini backends ready"
    );

    let poll_interval = Duration::from_secs(config.video.poll_interval_secs);
    let state = AppState::new(
        config,
        Arc::new(chat),
        Arc::new(ImageGenerator::new(Arc::new(image))),
        Arc::new(VideoGenerator::new(Arc::new(video), poll_interval)),
        credentials,
    )?;
    let conversation = Arc::clone(&state.conversation);

    routes::start_server(state, shutdown_signal()).await?;

    conversation.shutdown().await;
    tracing::info!("Postcraft stopped");
    Ok(())
}
