//! Error types for musiq-player
//!
//! Resolution errors (`InvalidUrl`, `NotFound`, `PlaylistUnavailable`) are
//! returned synchronously to the requester. `Download` and
//! `PlatformTransient` only ever reach the log: by the time they happen the
//! request has already returned.

use thiserror::Error;

/// Main error type for musiq-player
#[derive(Error, Debug)]
pub enum Error {
    /// Request URL does not belong to any supported platform
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Search or lookup found no matching track
    #[error("Not found: {0}")]
    NotFound(String),

    /// Playlist could not be expanded
    #[error("Playlist unavailable: {0}")]
    PlaylistUnavailable(String),

    /// Audio or metadata fetch failed for a queue entry
    #[error("Download error: {0}")]
    Download(String),

    /// Platform call failed in a way that may succeed later
    #[error("Platform error: {0}")]
    PlatformTransient(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Queue management errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Audio output errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Platform output that did not parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors from the shared configuration layer
    #[error(transparent)]
    Common(#[from] musiq_common::Error),
}

impl Error {
    /// True for the errors a song request can fail with synchronously
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_) | Error::NotFound(_) | Error::PlaylistUnavailable(_)
        )
    }
}

/// Convenience Result type using musiq-player Error
pub type Result<T> = std::result::Result<T, Error>;
