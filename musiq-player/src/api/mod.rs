//! HTTP adapter for the musiq engine
//!
//! Thin layer over [`MusiqEngine`](crate::playback::MusiqEngine): JSON in,
//! JSON out, plus an SSE stream of engine events. No authentication.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, AppContext};
