//! Scripted collaborators for unit tests

use crate::cache::{cache_key, AudioCache, AudioHandle};
use crate::error::{Error, Result};
use crate::output::AudioOutput;
use crate::platform::{split_artist_title, Platform, PlatformClient, TrackInfo, TrackStub};
use crate::playback::types::{ConfirmedTrack, TrackIntent};
use async_trait::async_trait;
use musiq_common::events::EnqueueSource;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// One track the mock platform knows about
#[derive(Debug, Clone)]
pub struct MockTrack {
    pub id: String,
    pub raw_title: String,
    pub duration: u64,
    pub delay: Duration,
    pub fail_download: bool,
    pub related: Vec<String>,
}

impl MockTrack {
    pub fn new(id: &str, raw_title: &str, duration: u64) -> Self {
        Self {
            id: id.to_string(),
            raw_title: raw_title.to_string(),
            duration,
            delay: Duration::ZERO,
            fail_download: false,
            related: Vec::new(),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn failing_download(mut self) -> Self {
        self.fail_download = true;
        self
    }

    pub fn with_related(mut self, ids: &[&str]) -> Self {
        self.related = ids.iter().map(|id| id.to_string()).collect();
        self
    }
}

/// In-memory platform stand-in, YouTube unless built with [`MockPlatform::soundcloud`]
pub struct MockPlatform {
    platform: Platform,
    tracks: Mutex<HashMap<String, MockTrack>>,
    playlists: Mutex<HashMap<String, Vec<String>>>,
    searches: Mutex<HashMap<String, String>>,
    related_fails: Mutex<bool>,
    related_hangs: Mutex<bool>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::serving(Platform::Youtube)
    }

    pub fn soundcloud() -> Self {
        Self::serving(Platform::Soundcloud)
    }

    fn serving(platform: Platform) -> Self {
        Self {
            platform,
            tracks: Mutex::default(),
            playlists: Mutex::default(),
            searches: Mutex::default(),
            related_fails: Mutex::default(),
            related_hangs: Mutex::default(),
        }
    }

    pub fn url_of(&self, id: &str) -> String {
        match self.platform {
            Platform::Youtube => format!("https://www.youtube.com/watch?v={}", id),
            Platform::Soundcloud => format!("https://soundcloud.com/artist/{}", id),
        }
    }

    pub fn add(&self, track: MockTrack) {
        let url = self.url_of(&track.id);
        self.tracks.lock().unwrap().insert(url, track);
    }

    /// Register a playlist and return its URL
    pub fn add_playlist(&self, list_id: &str, ids: &[&str]) -> String {
        let url = match self.platform {
            Platform::Youtube => format!("https://www.youtube.com/playlist?list={}", list_id),
            Platform::Soundcloud => format!("https://soundcloud.com/artist/sets/{}", list_id),
        };
        self.playlists
            .lock()
            .unwrap()
            .insert(url.clone(), ids.iter().map(|id| self.url_of(id)).collect());
        url
    }

    pub fn add_search(&self, text: &str, id: &str) {
        self.searches
            .lock()
            .unwrap()
            .insert(text.to_string(), self.url_of(id));
    }

    pub fn fail_related(&self) {
        *self.related_fails.lock().unwrap() = true;
    }

    /// Related lookups never return from now on
    pub fn hang_related(&self) {
        *self.related_hangs.lock().unwrap() = true;
    }

    pub fn info(&self, url: &str) -> Option<TrackInfo> {
        let tracks = self.tracks.lock().unwrap();
        tracks.get(url).map(|track| {
            let (artist, title) = split_artist_title(&track.raw_title, "Uploader");
            TrackInfo {
                platform: self.platform,
                external_url: url.to_string(),
                artist,
                title,
                duration: track.duration,
            }
        })
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn search(&self, text: &str) -> Result<TrackInfo> {
        let url = self.searches.lock().unwrap().get(text).cloned();
        url.and_then(|url| self.info(&url))
            .ok_or_else(|| Error::NotFound(text.to_string()))
    }

    async fn resolve_url(&self, url: &str) -> Result<TrackInfo> {
        self.info(url).ok_or_else(|| Error::NotFound(url.to_string()))
    }

    async fn expand_playlist(&self, url: &str, limit: usize) -> Result<Vec<TrackStub>> {
        let playlists = self.playlists.lock().unwrap();
        let members = playlists
            .get(url)
            .ok_or_else(|| Error::PlaylistUnavailable(url.to_string()))?;
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
        let hang = *self.related_hangs.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        if *self.related_fails.lock().unwrap() {
            return Err(Error::PlatformTransient("radio unavailable".to_string()));
        }
        let tracks = self.tracks.lock().unwrap();
        let related = tracks
            .get(&seed.external_url)
            .map(|t| t.related.clone())
            .unwrap_or_default();
        Ok(related
            .iter()
            .take(count)
            .map(|id| TrackStub {
                external_url: self.url_of(id),
                title: None,
            })
            .collect())
    }

    async fn download(&self, url: &str, _dest: &Path) -> Result<()> {
        let track = self
            .tracks
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Download(format!("{} is unavailable", url)))?;
        tokio::time::sleep(track.delay).await;
        if track.fail_download {
            return Err(Error::Download(format!("{} is private", url)));
        }
        Ok(())
    }
}

/// Cache that never touches disk and counts downloads
#[derive(Default)]
pub struct MemoryCache {
    stored: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCache for MemoryCache {
    async fn get_or_fetch(&self, canonical_url: &str, source: &dyn PlatformClient) -> Result<AudioHandle> {
        let key = cache_key(canonical_url);
        let handle = AudioHandle {
            path: PathBuf::from(format!("/memory/{}.m4a", key)),
            cache_key: key,
        };
        if self.stored.lock().unwrap().contains(canonical_url) {
            return Ok(handle);
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        let result = source.download(canonical_url, &handle.path).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        result?;
        self.stored.lock().unwrap().insert(canonical_url.to_string());
        Ok(handle)
    }
}

/// Output whose tracks end only when the test says so
#[derive(Default)]
pub struct ManualOutput {
    played: Mutex<Vec<String>>,
    finish: Notify,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// End the track currently playing
    pub fn finish_current(&self) {
        self.finish.notify_one();
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioOutput for ManualOutput {
    async fn play(&self, track: &ConfirmedTrack) -> Result<()> {
        self.played
            .lock()
            .unwrap()
            .push(track.metadata.external_url.clone());
        self.finish.notified().await;
        Ok(())
    }
}

/// Playlist-style intent: reference only, metadata left to the pipeline
pub fn intent_for(url: &str) -> TrackIntent {
    TrackIntent {
        platform: Platform::Youtube,
        reference: url.to_string(),
        requester: "tester".to_string(),
        from_playlist: true,
        source: EnqueueSource::Manual,
        resolved: None,
        title_hint: None,
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> futures::future::BoxFuture<'static, bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
