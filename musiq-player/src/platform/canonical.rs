//! Track URL canonicalisation
//!
//! Every platform has several URL shapes for the same track. The canonical
//! form is what the queue compares and what the audio cache is keyed by.

use super::Platform;
use crate::error::{Error, Result};
use url::Url;

const YOUTUBE_WATCH: &str = "https://www.youtube.com/watch?v=";

/// True if `query` should be treated as a URL rather than search text
pub fn looks_like_url(query: &str) -> bool {
    let query = query.trim();
    query.starts_with("http://") || query.starts_with("https://")
}

/// Platform whose URLs `raw` belongs to, judged by host alone
pub fn platform_of_url(raw: &str) -> Result<Platform> {
    Platform::ALL
        .into_iter()
        .find(|platform| parse_for(*platform, raw).is_ok())
        .ok_or_else(|| Error::InvalidUrl(format!("{} is not a URL of any supported platform", raw)))
}

/// Canonical URL of the track `raw` points to
pub fn canonical_track_url(platform: Platform, raw: &str) -> Result<String> {
    let url = parse_for(platform, raw)?;
    match platform {
        Platform::Youtube => youtube_video_id(&url)
            .map(|id| format!("{}{}", YOUTUBE_WATCH, id))
            .ok_or_else(|| Error::InvalidUrl(format!("No YouTube video id in {}", raw))),
        Platform::Soundcloud => {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                .unwrap_or_default();
            if segments.len() < 2 {
                return Err(Error::InvalidUrl(format!("Not a SoundCloud track: {}", raw)));
            }
            Ok(format!("https://soundcloud.com/{}", segments.join("/")))
        }
    }
}

/// Check that `raw` is a playlist URL of `platform`
pub fn check_playlist_url(platform: Platform, raw: &str) -> Result<Url> {
    let url = parse_for(platform, raw)?;
    if platform == Platform::Youtube && !url.query_pairs().any(|(k, _)| k == "list") {
        return Err(Error::InvalidUrl(format!("Not a YouTube playlist: {}", raw)));
    }
    Ok(url)
}

/// YouTube video id of a canonical or raw YouTube URL
pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let id = if host == "youtu.be" {
        url.path_segments()?.next().map(str::to_string)
    } else {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts") | Some("embed") => segments.next().map(str::to_string),
            _ => None,
        }
    }?;

    let valid = id.len() == 11
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}

fn parse_for(platform: Platform, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidUrl(format!("Unsupported scheme in {}", raw)));
    }

    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    let supported = match platform {
        Platform::Youtube => matches!(host, "youtube.com" | "music.youtube.com" | "youtu.be"),
        Platform::Soundcloud => host == "soundcloud.com",
    };

    if supported {
        Ok(url)
    } else {
        Err(Error::InvalidUrl(format!("{} is not a {} URL", raw, platform)))
    }
}
