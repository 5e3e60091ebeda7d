//! Musiq Player (musiq-player) - Main entry point
//!
//! Runs one shared music queue: song requests come in over HTTP, tracks are
//! downloaded with yt-dlp into the audio cache, and the queue plays through
//! the configured output command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use musiq_common::config::{CacheDirResolver, TomlConfig};
use musiq_player::api::{self, AppContext};
use musiq_player::cache::DiskAudioCache;
use musiq_player::output::{AudioOutput, CommandOutput, SilentOutput};
use musiq_player::platform::{Platform, Platforms, YtDlpClient};
use musiq_player::MusiqEngine;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for musiq-player
#[derive(Parser, Debug)]
#[command(name = "musiq-player")]
#[command(about = "Shared music queue player")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MUSIQ_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MUSIQ_PORT")]
    port: Option<u16>,

    /// Audio cache folder (overrides MUSIQ_CACHE_DIR and the config file)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    let default_filter = format!(
        "musiq_player={level},musiq_common={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = args.port.unwrap_or(config.port);
    let cache_dir = CacheDirResolver::new(args.cache_dir.clone(), &config).resolve();

    info!("Starting Musiq Player on port {}", port);
    info!("Audio cache: {}", cache_dir.display());

    let platforms = Platforms::new()
        .with(Arc::new(YtDlpClient::new(Platform::Youtube)))
        .with(Arc::new(YtDlpClient::new(Platform::Soundcloud)));

    let output: Arc<dyn AudioOutput> = match &config.output.command {
        Some(argv) => {
            info!("Audio output: {}", argv.join(" "));
            Arc::new(CommandOutput::new(argv.clone()).context("Invalid output command")?)
        }
        None => {
            info!("No output command configured, playing silently");
            Arc::new(SilentOutput)
        }
    };

    // Initialize engine
    let engine = Arc::new(
        MusiqEngine::new(
            &config.queue,
            platforms,
            Arc::new(DiskAudioCache::new(cache_dir)),
            output,
        )
        .context("Failed to initialize musiq engine")?,
    );
    engine.start().await;
    info!("Musiq engine started");

    let ctx = AppContext {
        engine: Arc::clone(&engine),
        port,
    };
    let served = api::run(ctx, shutdown_signal()).await;

    // Stop playback and downloads even if the server failed
    engine.shutdown().await;
    served.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
