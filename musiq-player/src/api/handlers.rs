//! HTTP request handlers
//!
//! Implements the musiq control endpoints.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::playback::{MusiqState, SongRequest, SongView};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestMusicResponse {
    pub entry_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    pub current_song: Option<SongView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct BoolValueRequest {
    pub value: bool,
}

#[derive(Debug, Deserialize)]
pub struct CountValueRequest {
    pub value: usize,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Map an engine error to an HTTP status and JSON body
fn api_error(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::InvalidUrl(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) | Error::Queue(_) => StatusCode::NOT_FOUND,
        Error::PlaylistUnavailable(_) | Error::PlatformTransient(_) => StatusCode::BAD_GATEWAY,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Health & State
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "musiq-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: ctx.port,
    })
}

/// GET /musiq/state - current song, visible queue and flags
pub async fn get_state(State(ctx): State<AppContext>) -> Json<MusiqState> {
    Json(ctx.engine.get_state().await)
}

// ============================================================================
// Requests & Queue
// ============================================================================

/// POST /musiq/request_music
///
/// Resolution errors come back immediately; downloads continue after the
/// response.
pub async fn request_music(
    State(ctx): State<AppContext>,
    Json(req): Json<SongRequest>,
) -> ApiResult<RequestMusicResponse> {
    info!(
        "Music request: '{}' (playlist: {}, platform: {:?})",
        req.query, req.playlist, req.platform
    );
    let entry_ids = ctx.engine.submit_request(req).await.map_err(api_error)?;
    Ok(Json(RequestMusicResponse { entry_ids }))
}

/// POST /musiq/skip
pub async fn skip(State(ctx): State<AppContext>) -> Json<SkipResponse> {
    Json(SkipResponse {
        current_song: ctx.engine.skip().await,
    })
}

/// POST /musiq/remove_all
pub async fn remove_all(State(ctx): State<AppContext>) -> Json<CountResponse> {
    Json(CountResponse {
        count: ctx.engine.remove_all().await,
    })
}

/// DELETE /musiq/queue/:entry_id
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    ctx.engine.remove(entry_id).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Autoplay & Radio
// ============================================================================

/// POST /musiq/set_autoplay
pub async fn set_autoplay(
    State(ctx): State<AppContext>,
    Json(req): Json<BoolValueRequest>,
) -> StatusCode {
    ctx.engine.set_autoplay(req.value).await;
    StatusCode::NO_CONTENT
}

/// POST /musiq/request_radio
pub async fn request_radio(State(ctx): State<AppContext>) -> ApiResult<CountResponse> {
    let count = ctx.engine.request_radio().await.map_err(api_error)?;
    Ok(Json(CountResponse { count }))
}

// ============================================================================
// Settings
// ============================================================================

/// POST /musiq/set_max_playlist_items
pub async fn set_max_playlist_items(
    State(ctx): State<AppContext>,
    Json(req): Json<CountValueRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    ctx.engine
        .set_max_playlist_items(req.value)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /musiq/set_radio_fill_count
pub async fn set_radio_fill_count(
    State(ctx): State<AppContext>,
    Json(req): Json<CountValueRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    ctx.engine.set_radio_fill_count(req.value).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
