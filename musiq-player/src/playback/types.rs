//! Queue data model
//!
//! A request becomes one or more [`TrackIntent`]s, each of which is wrapped in
//! a [`QueueEntry`] that moves through [`EntryState`] as its download runs.

use crate::cache::AudioHandle;
use crate::platform::{Platform, TrackInfo};
use chrono::{DateTime, Utc};
use musiq_common::events::EnqueueSource;
use serde::Serialize;
use uuid::Uuid;

/// Unresolved reference to a song, created by the resolver
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIntent {
    pub platform: Platform,
    /// Canonical track URL
    pub reference: String,
    pub requester: String,
    pub from_playlist: bool,
    pub source: EnqueueSource,
    /// Metadata the resolver already looked up (direct URL or search)
    pub resolved: Option<TrackInfo>,
    /// Title shown while a playlist member is still downloading
    pub title_hint: Option<String>,
}

impl TrackIntent {
    /// Intent for a track whose metadata is already known
    pub fn resolved(track: TrackInfo, requester: &str, source: EnqueueSource) -> Self {
        Self {
            platform: track.platform,
            reference: track.external_url.clone(),
            requester: requester.to_string(),
            from_playlist: false,
            source,
            title_hint: Some(track.title.clone()),
            resolved: Some(track),
        }
    }
}

/// Metadata and audio of a playable track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTrack {
    pub metadata: TrackInfo,
    pub audio: AudioHandle,
}

/// Readiness of a queue entry
///
/// Only the queue manager moves an entry between states. Failed and Removed
/// entries are evicted from the visible sequence immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Downloading,
    Confirmed(ConfirmedTrack),
    Failed(String),
    Removed,
}

impl EntryState {
    pub fn name(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Downloading => "downloading",
            EntryState::Confirmed(_) => "confirmed",
            EntryState::Failed(_) => "failed",
            EntryState::Removed => "removed",
        }
    }

    /// Visible entries appear in queue snapshots
    pub fn is_visible(&self) -> bool {
        matches!(
            self,
            EntryState::Pending | EntryState::Downloading | EntryState::Confirmed(_)
        )
    }
}

/// One slot in the ordered queue
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: Uuid,
    pub intent: TrackIntent,
    pub state: EntryState,
    /// Insertion order index, strictly increasing per queue
    pub order: u64,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn is_confirmed(&self) -> bool {
        matches!(self.state, EntryState::Confirmed(_))
    }

    /// Resolved metadata, available once confirmed
    pub fn metadata(&self) -> Option<&TrackInfo> {
        match &self.state {
            EntryState::Confirmed(track) => Some(&track.metadata),
            _ => None,
        }
    }

    /// Canonical URL the entry refers to
    pub fn external_url(&self) -> &str {
        self.metadata()
            .map(|m| m.external_url.as_str())
            .unwrap_or(&self.intent.reference)
    }

    /// Turn a confirmed entry into the current song
    pub fn into_current(self) -> Option<CurrentSong> {
        match self.state {
            EntryState::Confirmed(track) => Some(CurrentSong {
                entry_id: self.id,
                requester: self.intent.requester,
                source: self.intent.source,
                track,
                started_at: Utc::now(),
            }),
            _ => None,
        }
    }

    pub fn view(&self) -> EntryView {
        let info = self.metadata().or(self.intent.resolved.as_ref());
        EntryView {
            id: self.id,
            order: self.order,
            state: self.state.name(),
            confirmed: self.is_confirmed(),
            platform: self.intent.platform,
            external_url: self.external_url().to_string(),
            artist: info.map(|m| m.artist.clone()),
            title: info
                .map(|m| m.title.clone())
                .or_else(|| self.intent.title_hint.clone()),
            duration: info.map(|m| m.duration),
            requester: self.intent.requester.clone(),
            source: self.intent.source,
        }
    }
}

/// Song currently playing
#[derive(Debug, Clone)]
pub struct CurrentSong {
    pub entry_id: Uuid,
    pub requester: String,
    pub source: EnqueueSource,
    pub track: ConfirmedTrack,
    pub started_at: DateTime<Utc>,
}

impl CurrentSong {
    pub fn view(&self) -> SongView {
        let m = &self.track.metadata;
        SongView {
            id: self.entry_id,
            platform: m.platform,
            external_url: m.external_url.clone(),
            artist: m.artist.clone(),
            title: m.title.clone(),
            duration: m.duration,
            requester: self.requester.clone(),
            source: self.source,
        }
    }
}

/// Queue entry as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub id: Uuid,
    pub order: u64,
    pub state: &'static str,
    pub confirmed: bool,
    pub platform: Platform,
    pub external_url: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub duration: Option<u64>,
    pub requester: String,
    pub source: EnqueueSource,
}

/// Current song as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongView {
    pub id: Uuid,
    pub platform: Platform,
    pub external_url: String,
    pub artist: String,
    pub title: String,
    pub duration: u64,
    pub requester: String,
    pub source: EnqueueSource,
}

/// Playback controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Playing,
}

/// Point-in-time view of the whole player
#[derive(Debug, Clone, Serialize)]
pub struct MusiqState {
    pub current_song: Option<SongView>,
    pub song_queue: Vec<EntryView>,
    pub autoplay: bool,
    pub radio_active: bool,
    pub status: PlaybackStatus,
}
