//! # Musiq Player Library (musiq-player)
//!
//! Shared music queue core: resolves song requests, downloads and confirms
//! tracks in the background, keeps the ordered queue, drives playback and
//! extends the queue through radio and autoplay.
//!
//! **Architecture:** one [`MusiqEngine`] per queue instance. Platform access,
//! the audio cache and audio output are collaborators behind traits
//! ([`platform::PlatformClient`], [`cache::AudioCache`],
//! [`output::AudioOutput`]).

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod output;
pub mod platform;
pub mod playback;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use playback::{MusiqEngine, MusiqState, SongRequest};
