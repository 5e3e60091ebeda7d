//! Scripted platform, cache and output for integration tests

use async_trait::async_trait;
use musiq_player::cache::{cache_key, AudioCache, AudioHandle};
use musiq_player::output::AudioOutput;
use musiq_player::platform::{split_artist_title, Platform, PlatformClient, TrackInfo, TrackStub};
use musiq_player::playback::types::ConfirmedTrack;
use musiq_player::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// One track known to [`ScriptedPlatform`]
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub raw_title: String,
    pub uploader: String,
    pub duration: u64,
    pub latency: Duration,
    pub private: bool,
    pub related: Vec<String>,
}

impl Track {
    pub fn new(id: &str, raw_title: &str, duration: u64) -> Self {
        Self {
            id: id.to_string(),
            raw_title: raw_title.to_string(),
            uploader: "Uploader".to_string(),
            duration,
            latency: Duration::ZERO,
            private: false,
            related: Vec::new(),
        }
    }

    /// Download takes `ms` milliseconds
    pub fn latency_ms(mut self, ms: u64) -> Self {
        self.latency = Duration::from_millis(ms);
        self
    }

    /// Metadata resolves but the download fails
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn related(mut self, ids: &[&str]) -> Self {
        self.related = ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

/// In-memory YouTube with scripted search results, playlists and radio
#[derive(Default)]
pub struct ScriptedPlatform {
    tracks: Mutex<HashMap<String, Track>>,
    playlists: Mutex<HashMap<String, Vec<String>>>,
    searches: Mutex<HashMap<String, String>>,
    downloads: Mutex<HashMap<String, usize>>,
    related_calls: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }

    pub fn add(&self, track: Track) -> &Self {
        self.tracks
            .lock()
            .unwrap()
            .insert(Self::url(&track.id), track);
        self
    }

    pub fn search_result(&self, text: &str, id: &str) -> &Self {
        self.searches
            .lock()
            .unwrap()
            .insert(text.to_string(), Self::url(id));
        self
    }

    /// Register a playlist and return its URL
    pub fn playlist(&self, list_id: &str, ids: &[&str]) -> String {
        let url = format!("https://www.youtube.com/playlist?list={}", list_id);
        self.playlists
            .lock()
            .unwrap()
            .insert(url.clone(), ids.iter().map(|id| Self::url(id)).collect());
        url
    }

    /// Downloads performed for one track
    pub fn downloads_of(&self, id: &str) -> usize {
        self.downloads
            .lock()
            .unwrap()
            .get(&Self::url(id))
            .copied()
            .unwrap_or(0)
    }

    pub fn related_calls(&self) -> usize {
        self.related_calls.load(Ordering::SeqCst)
    }

    fn info(&self, url: &str) -> Option<TrackInfo> {
        let tracks = self.tracks.lock().unwrap();
        tracks.get(url).map(|t| {
            let (artist, title) = split_artist_title(&t.raw_title, &t.uploader);
            TrackInfo {
                platform: Platform::Youtube,
                external_url: url.to_string(),
                artist,
                title,
                duration: t.duration,
            }
        })
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatform {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn search(&self, text: &str) -> Result<TrackInfo> {
        let url = self.searches.lock().unwrap().get(text).cloned();
        url.and_then(|url| self.info(&url))
            .ok_or_else(|| Error::NotFound(format!("No results for '{}'", text)))
    }

    async fn resolve_url(&self, url: &str) -> Result<TrackInfo> {
        self.info(url)
            .ok_or_else(|| Error::NotFound(format!("Video unavailable: {}", url)))
    }

    async fn expand_playlist(&self, url: &str, limit: usize) -> Result<Vec<TrackStub>> {
        let playlists = self.playlists.lock().unwrap();
        let members = playlists
            .get(url)
            .ok_or_else(|| Error::PlaylistUnavailable(format!("{} does not exist", url)))?;
        Ok(members
            .iter()
            .take(limit)
            .map(|url| TrackStub {
                external_url: url.clone(),
                title: None,
            })
            .collect())
    }

    async fn related_tracks(&self, seed: &TrackInfo, count: usize) -> Result<Vec<TrackStub>> {
        self.related_calls.fetch_add(1, Ordering::SeqCst);
        let tracks = self.tracks.lock().unwrap();
        let related = tracks
            .get(&seed.external_url)
            .map(|t| t.related.clone())
            .unwrap_or_default();
        Ok(related
            .iter()
            .take(count)
            .map(|id| TrackStub {
                external_url: Self::url(id),
                title: None,
            })
            .collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let track = self
            .tracks
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download(format!("{} is unavailable", url)))?;
        *self
            .downloads
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        tokio::time::sleep(track.latency).await;
        if track.private {
            return Err(Error::Download(format!("{} is private", url)));
        }
        tokio::fs::write(dest, track.id.as_bytes()).await?;
        Ok(())
    }
}

/// Cache without reuse, counting calls per URL
#[derive(Default)]
pub struct CountingCache {
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&ScriptedPlatform::url(id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl AudioCache for CountingCache {
    async fn get_or_fetch(&self, canonical_url: &str, source: &dyn PlatformClient) -> Result<AudioHandle> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(canonical_url.to_string())
            .or_default() += 1;

        let key = cache_key(canonical_url);
        let path = std::env::temp_dir().join(format!("musiq-test-{}.m4a", key));
        source.download(canonical_url, &path).await?;
        Ok(AudioHandle {
            path,
            cache_key: key,
        })
    }
}

/// Output that never finishes a track unless told to
#[derive(Default)]
pub struct ManualOutput {
    started: Mutex<Vec<String>>,
    finish: Notify,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the track currently playing end naturally
    pub fn finish_track(&self) {
        self.finish.notify_one();
    }

    /// Canonical URLs handed to the output, in order
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioOutput for ManualOutput {
    async fn play(&self, track: &ConfirmedTrack) -> Result<()> {
        self.started
            .lock()
            .unwrap()
            .push(track.metadata.external_url.clone());
        self.finish.notified().await;
        Ok(())
    }
}
