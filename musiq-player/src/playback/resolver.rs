//! Request resolver
//!
//! Turns a raw request into ordered track intents. Single tracks are looked up
//! right away so the requester learns about bad URLs or empty searches
//! immediately. Playlist members only get a reference here; their metadata is
//! fetched later by the download pipeline so the queue fills quickly.

use crate::config::RuntimeSettings;
use crate::error::{Error, Result};
use crate::platform::{
    canonical_track_url, check_playlist_url, looks_like_url, platform_of_url, Platform, Platforms,
};
use crate::playback::types::TrackIntent;
use musiq_common::events::EnqueueSource;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A user's request for music
#[derive(Debug, Clone, Deserialize)]
pub struct SongRequest {
    /// Search text, track URL or playlist URL
    pub query: String,
    #[serde(default)]
    pub playlist: bool,
    /// Platform hint; empty or missing means YouTube
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default = "default_requester")]
    pub requester: String,
}

fn default_requester() -> String {
    "anonymous".to_string()
}

impl SongRequest {
    pub fn new(query: impl Into<String>, playlist: bool, platform: Option<&str>) -> Self {
        Self {
            query: query.into(),
            playlist,
            platform: platform.map(str::to_string),
            requester: default_requester(),
        }
    }
}

pub struct RequestResolver {
    platforms: Arc<Platforms>,
    settings: Arc<RuntimeSettings>,
}

impl RequestResolver {
    pub fn new(platforms: Arc<Platforms>, settings: Arc<RuntimeSettings>) -> Self {
        Self { platforms, settings }
    }

    /// Resolve `request` into one intent, or one per playlist member
    ///
    /// Errors are always one of the resolution errors (`InvalidUrl`,
    /// `NotFound`, `PlaylistUnavailable`); a playlist either yields its
    /// truncated member list or an error, never part of one.
    pub async fn resolve(&self, request: &SongRequest) -> Result<Vec<TrackIntent>> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::NotFound("Empty query".to_string()));
        }

        // A URL names its own platform; the hint only picks where to search
        let platform = if looks_like_url(query) {
            let platform = platform_of_url(query)?;
            if request.platform.as_deref().is_some_and(|hint| !hint.trim().is_empty())
                && Platform::from_hint(request.platform.as_deref()).ok() != Some(platform)
            {
                debug!("Ignoring platform hint {:?} for {} URL", request.platform, platform);
            }
            platform
        } else {
            Platform::from_hint(request.platform.as_deref())?
        };

        if request.playlist {
            self.resolve_playlist(platform, query, &request.requester).await
        } else {
            self.resolve_track(platform, query, &request.requester)
                .await
                .map(|intent| vec![intent])
        }
    }

    async fn resolve_track(&self, platform: Platform, query: &str, requester: &str) -> Result<TrackIntent> {
        let client = self.platforms.get(platform)?;

        let track = if looks_like_url(query) {
            let url = canonical_track_url(platform, query)?;
            debug!("Resolving {} track {}", platform, url);
            client.resolve_url(&url).await
        } else {
            debug!("Searching {} for '{}'", platform, query);
            client.search(query).await
        }
        .map_err(as_not_found)?;

        info!(
            "Resolved '{}' to {} - {} ({})",
            query, track.artist, track.title, track.external_url
        );
        Ok(TrackIntent::resolved(track, requester, EnqueueSource::Manual))
    }

    async fn resolve_playlist(
        &self,
        platform: Platform,
        query: &str,
        requester: &str,
    ) -> Result<Vec<TrackIntent>> {
        let client = self.platforms.get(platform)?;
        let url = check_playlist_url(platform, query)?;
        let limit = self.settings.max_playlist_items();

        let mut members = client
            .expand_playlist(url.as_str(), limit)
            .await
            .map_err(|e| match e {
                Error::PlaylistUnavailable(_) => e,
                other => Error::PlaylistUnavailable(other.to_string()),
            })?;
        if members.is_empty() {
            return Err(Error::PlaylistUnavailable(format!("{} has no playable tracks", url)));
        }
        members.truncate(limit);

        info!("Expanded playlist {} into {} tracks", url, members.len());
        Ok(members
            .into_iter()
            .map(|stub| TrackIntent {
                platform,
                reference: stub.external_url,
                requester: requester.to_string(),
                from_playlist: true,
                source: EnqueueSource::Manual,
                resolved: None,
                title_hint: stub.title,
            })
            .collect())
    }
}

/// Lookup failures other than a bad URL are reported as "not found"
fn as_not_found(err: Error) -> Error {
    match err {
        Error::InvalidUrl(_) | Error::NotFound(_) => err,
        other => Error::NotFound(other.to_string()),
    }
}
