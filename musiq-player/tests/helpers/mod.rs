//! Test helper modules for musiq-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedPlatform: in-memory platform with per-track latency and failures
//! - CountingCache / ManualOutput: observable cache and audio output
//! - TestServer: engine plus router driven through HTTP requests

#![allow(dead_code)]

pub mod collaborators;
pub mod test_server;

pub use collaborators::{CountingCache, ManualOutput, ScriptedPlatform, Track};
pub use test_server::TestServer;
