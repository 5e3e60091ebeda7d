//! Music platform collaborators
//!
//! The core only talks to platforms through [`PlatformClient`]. A request names
//! its platform through a free-form hint; [`Platforms`] maps the parsed
//! [`Platform`] to the client serving it.

pub mod canonical;
pub mod ytdlp;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use canonical::{canonical_track_url, check_playlist_url, looks_like_url, platform_of_url};
pub use ytdlp::YtDlpClient;

/// Supported music platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Soundcloud,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Youtube, Platform::Soundcloud];

    /// Parse a request's platform hint; no hint means YouTube
    pub fn from_hint(hint: Option<&str>) -> Result<Self> {
        match hint.map(str::trim) {
            None | Some("") => Ok(Platform::Youtube),
            Some(value) => value.parse(),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "soundcloud" => Ok(Platform::Soundcloud),
            other => Err(Error::InvalidUrl(format!("Unsupported platform: {}", other))),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Youtube => write!(f, "youtube"),
            Platform::Soundcloud => write!(f, "soundcloud"),
        }
    }
}

/// Fully resolved track metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub platform: Platform,
    /// Canonical URL, also the audio cache key
    pub external_url: String,
    pub artist: String,
    pub title: String,
    /// Duration in whole seconds
    pub duration: u64,
}

/// Unresolved playlist member or related-track candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackStub {
    /// Canonical URL
    pub external_url: String,
    pub title: Option<String>,
}

/// Access to one music platform
///
/// Implementations return canonical URLs (see [`canonical_track_url`]) in
/// every `TrackInfo` and `TrackStub` they produce.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Platform served by this client
    fn platform(&self) -> Platform;

    /// Best match for free text; `Error::NotFound` if nothing matches
    async fn search(&self, text: &str) -> Result<TrackInfo>;

    /// Metadata for a canonical track URL
    async fn resolve_url(&self, url: &str) -> Result<TrackInfo>;

    /// Ordered members of a playlist, at most `limit` of them
    async fn expand_playlist(&self, url: &str, limit: usize) -> Result<Vec<TrackStub>>;

    /// Tracks the platform suggests after `seed`, at most `count` of them
    async fn related_tracks(&self, seed: &TrackInfo, count: usize) -> Result<Vec<TrackStub>>;

    /// Store the audio for `url` at exactly `dest`
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Registry of configured platform clients
#[derive(Clone, Default)]
pub struct Platforms {
    clients: HashMap<Platform, Arc<dyn PlatformClient>>,
}

impl Platforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for the platform it reports
    pub fn with(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.clients.insert(client.platform(), client);
        self
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformClient>> {
        self.clients
            .get(&platform)
            .cloned()
            .ok_or_else(|| Error::InvalidUrl(format!("No client configured for {}", platform)))
    }
}

/// Split a video title of the form `Artist - Title`
///
/// Falls back to `fallback_artist` (usually the uploader) when the title has
/// no separator.
pub fn split_artist_title(raw_title: &str, fallback_artist: &str) -> (String, String) {
    match raw_title.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() && !title.trim().is_empty() => {
            (artist.trim().to_string(), title.trim().to_string())
        }
        _ => (fallback_artist.trim().to_string(), raw_title.trim().to_string()),
    }
}
