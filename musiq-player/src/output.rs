//! Audio output collaborators
//!
//! The player never decodes audio itself. An [`AudioOutput`] is handed the
//! cached file of the current song and reports when it has finished playing.
//! Stopping early is done by dropping the `play` future.

use crate::error::{Error, Result};
use crate::playback::types::ConfirmedTrack;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `track` to the end
    ///
    /// Resolves when playback finished on its own. Dropping the future must
    /// stop playback.
    async fn play(&self, track: &ConfirmedTrack) -> Result<()>;
}

/// Output that plays nothing and holds each track for its duration
#[derive(Debug, Default, Clone)]
pub struct SilentOutput;

#[async_trait]
impl AudioOutput for SilentOutput {
    async fn play(&self, track: &ConfirmedTrack) -> Result<()> {
        debug!(
            "Silently holding {} for {}s",
            track.metadata.external_url, track.metadata.duration
        );
        tokio::time::sleep(Duration::from_secs(track.metadata.duration)).await;
        Ok(())
    }
}

/// Output running an external player per track
///
/// The cached file path is appended to `argv`, e.g. `["mpv", "--no-video"]`.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    argv: Vec<String>,
}

impl CommandOutput {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(Error::Config("output.command must not be empty".to_string()));
        }
        Ok(Self { argv })
    }
}

#[async_trait]
impl AudioOutput for CommandOutput {
    async fn play(&self, track: &ConfirmedTrack) -> Result<()> {
        info!(
            "Playing {} - {} via {}",
            track.metadata.artist, track.metadata.title, self.argv[0]
        );

        let status = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .arg(&track.audio.path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::Playback(format!("Failed to start {}: {}", self.argv[0], e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Playback(format!("{} exited with {}", self.argv[0], status)))
        }
    }
}
