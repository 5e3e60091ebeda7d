//! Queue orchestration: resolve, download, queue, play, extend

pub mod controller;
pub mod download;
pub mod engine;
pub mod extension;
pub mod queue_manager;
pub mod resolver;
pub mod types;

pub use engine::MusiqEngine;
pub use resolver::SongRequest;
pub use types::{EntryView, MusiqState, PlaybackStatus, SongView};
