//! yt-dlp backed platform client
//!
//! Runs the `yt-dlp` executable for every platform call and parses its JSON
//! output. One client instance serves one platform; YouTube and SoundCloud
//! differ only in search prefix and in where related tracks come from.

use super::{canonical_track_url, split_artist_title, Platform, PlatformClient, TrackInfo, TrackStub};
use crate::error::{Error, Result};
use crate::platform::canonical::youtube_video_id;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Metadata lookups are expected to be quick
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Audio extraction may transcode a long track
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Single video as printed by `yt-dlp -j`
#[derive(Debug, Deserialize)]
struct VideoJson {
    id: String,
    title: String,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Flat playlist as printed by `yt-dlp -J --flat-playlist`
#[derive(Debug, Deserialize)]
struct PlaylistJson {
    #[serde(default)]
    entries: Vec<FlatEntryJson>,
}

#[derive(Debug, Deserialize)]
struct FlatEntryJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Platform client shelling out to yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpClient {
    platform: Platform,
    program: PathBuf,
}

impl YtDlpClient {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            program: PathBuf::from("yt-dlp"),
        }
    }

    /// Use a specific yt-dlp executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn search_prefix(&self) -> &'static str {
        match self.platform {
            Platform::Youtube => "ytsearch1:",
            Platform::Soundcloud => "scsearch1:",
        }
    }

    /// Run yt-dlp and return stdout, or the last stderr line on failure
    async fn run(&self, args: &[&str], timeout: Duration) -> std::result::Result<Vec<u8>, String> {
        debug!("yt-dlp {}", args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, output)
            .await
            .map_err(|_| format!("yt-dlp timed out after {}s", timeout.as_secs()))?
            .map_err(|e| format!("failed to run {}: {}", self.program.display(), e))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp failed")
                .to_string())
        }
    }

    fn track_from_json(&self, video: VideoJson) -> Result<TrackInfo> {
        let external_url = match self.platform {
            Platform::Youtube => format!("https://www.youtube.com/watch?v={}", video.id),
            Platform::Soundcloud => {
                let page = video.webpage_url.as_deref().ok_or_else(|| {
                    Error::NotFound(format!("No page URL for SoundCloud track {}", video.id))
                })?;
                canonical_track_url(Platform::Soundcloud, page)?
            }
        };

        let uploader = video.uploader.as_deref().unwrap_or_default();
        let (artist, title) = match (video.artist, video.track) {
            (Some(artist), Some(track)) => (artist, track),
            _ => split_artist_title(&video.title, uploader),
        };

        Ok(TrackInfo {
            platform: self.platform,
            external_url,
            artist,
            title,
            duration: video.duration.map(|d| d.round() as u64).unwrap_or(0),
        })
    }

    fn stubs_from_json(&self, playlist: PlaylistJson) -> Vec<TrackStub> {
        playlist
            .entries
            .into_iter()
            .filter_map(|entry| {
                let raw = match (self.platform, entry.url, entry.id) {
                    (_, Some(url), _) if url.starts_with("http") => url,
                    (Platform::Youtube, _, Some(id)) => {
                        format!("https://www.youtube.com/watch?v={}", id)
                    }
                    _ => return None,
                };
                canonical_track_url(self.platform, &raw)
                    .ok()
                    .map(|external_url| TrackStub {
                        external_url,
                        title: entry.title,
                    })
            })
            .collect()
    }

    async fn flat_playlist(&self, url: &str, limit: usize) -> std::result::Result<Vec<TrackStub>, String> {
        let end = limit.to_string();
        let stdout = self
            .run(
                &["-J", "--flat-playlist", "--playlist-end", &end, url],
                METADATA_TIMEOUT,
            )
            .await?;
        let playlist: PlaylistJson =
            serde_json::from_slice(&stdout).map_err(|e| format!("unreadable playlist: {}", e))?;
        let mut stubs = self.stubs_from_json(playlist);
        stubs.truncate(limit);
        Ok(stubs)
    }
}

#[async_trait]
impl PlatformClient for YtDlpClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn search(&self, text: &str) -> Result<TrackInfo> {
        let query = format!("{}{}", self.search_prefix(), text);
        let stdout = self
            .run(&["-j", "--skip-download", "--no-playlist", &query], METADATA_TIMEOUT)
            .await
            .map_err(Error::NotFound)?;

        let line = stdout
            .split(|b| *b == b'\n')
            .find(|line| !line.is_empty())
            .ok_or_else(|| Error::NotFound(format!("No results for '{}'", text)))?;
        let video: VideoJson = serde_json::from_slice(line)?;
        self.track_from_json(video)
    }

    async fn resolve_url(&self, url: &str) -> Result<TrackInfo> {
        let stdout = self
            .run(&["-j", "--skip-download", "--no-playlist", url], METADATA_TIMEOUT)
            .await
            .map_err(Error::NotFound)?;
        let video: VideoJson = serde_json::from_slice(&stdout)?;
        self.track_from_json(video)
    }

    async fn expand_playlist(&self, url: &str, limit: usize) -> Result<Vec<TrackStub>> {
        self.flat_playlist(url, limit)
            .await
            .map_err(Error::PlaylistUnavailable)
    }

    async fn related_tracks(&self, seed: &TrackInfo, count: usize) -> Result<Vec<TrackStub>> {
        let listing = match self.platform {
            Platform::Youtube => {
                let id = url::Url::parse(&seed.external_url)
                    .ok()
                    .as_ref()
                    .and_then(youtube_video_id)
                    .ok_or_else(|| {
                        Error::PlatformTransient(format!("No video id in {}", seed.external_url))
                    })?;
                format!("https://www.youtube.com/watch?v={}&list=RD{}", id, id)
            }
            Platform::Soundcloud => format!("{}/recommended", seed.external_url),
        };

        self.flat_playlist(&listing, count)
            .await
            .map_err(Error::PlatformTransient)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        // yt-dlp picks the extension itself; --audio-format pins it to m4a
        let template = dest.with_extension("%(ext)s");
        let template = template.to_string_lossy();
        self.run(
            &["-x", "--audio-format", "m4a", "--no-playlist", "-o", &template, url],
            DOWNLOAD_TIMEOUT,
        )
        .await
        .map_err(Error::Download)?;

        if tokio::fs::try_exists(dest).await? {
            Ok(())
        } else {
            Err(Error::Download(format!(
                "yt-dlp finished but {} is missing",
                dest.display()
            )))
        }
    }
}
