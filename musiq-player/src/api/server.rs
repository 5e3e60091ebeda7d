//! HTTP server setup and routing
//!
//! Sets up the Axum router for the control endpoints and SSE.

use crate::error::{Error, Result};
use crate::playback::MusiqEngine;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<MusiqEngine>,
    pub port: u16,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Polled state
        .route("/musiq/state", get(super::handlers::get_state))

        // Requests and queue control
        .route("/musiq/request_music", post(super::handlers::request_music))
        .route("/musiq/skip", post(super::handlers::skip))
        .route("/musiq/remove_all", post(super::handlers::remove_all))
        .route("/musiq/queue/:entry_id", delete(super::handlers::remove_entry))

        // Autoplay and radio
        .route("/musiq/set_autoplay", post(super::handlers::set_autoplay))
        .route("/musiq/request_radio", post(super::handlers::request_radio))

        // Settings
        .route("/musiq/set_max_playlist_items", post(super::handlers::set_max_playlist_items))
        .route("/musiq/set_radio_fill_count", post(super::handlers::set_radio_fill_count))

        // SSE event stream
        .route("/musiq/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)

        // Request logging
        .layer(TraceLayer::new_for_http())

        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run(ctx: AppContext, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
