//! # Musiq Common Library
//!
//! Shared code for the musiq queue player including:
//! - Bootstrap configuration and queue settings
//! - Event types (MusiqEvent enum) and the EventBus
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use config::{PopPolicy, QueueSettings, TomlConfig};
pub use error::{Error, Result};
