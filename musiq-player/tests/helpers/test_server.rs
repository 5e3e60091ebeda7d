//! Test server wrapper for integration tests
//!
//! Runs a real engine with scripted collaborators behind the real router, so
//! tests talk to it the way a polling client does.

use super::{ManualOutput, ScriptedPlatform};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use musiq_common::QueueSettings;
use musiq_player::api::{create_router, AppContext};
use musiq_player::cache::{AudioCache, DiskAudioCache};
use musiq_player::platform::Platforms;
use musiq_player::MusiqEngine;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tower::ServiceExt;

/// Test server instance with full API and engine
pub struct TestServer {
    pub router: Router,
    pub engine: Arc<MusiqEngine>,
    pub platform: Arc<ScriptedPlatform>,
    pub output: Arc<ManualOutput>,
    _cache_dir: TempDir,
}

impl TestServer {
    /// Start with default queue settings and a temporary disk cache
    pub async fn start(platform: Arc<ScriptedPlatform>) -> Self {
        Self::start_with(platform, QueueSettings::default(), None).await
    }

    /// Start with explicit settings; `cache` replaces the disk cache
    pub async fn start_with(
        platform: Arc<ScriptedPlatform>,
        settings: QueueSettings,
        cache: Option<Arc<dyn AudioCache>>,
    ) -> Self {
        let cache_dir = tempfile::tempdir().expect("temp dir");
        let cache = cache.unwrap_or_else(|| Arc::new(DiskAudioCache::new(cache_dir.path())));
        let output = Arc::new(ManualOutput::new());

        let engine = Arc::new(
            MusiqEngine::new(
                &settings,
                Platforms::new().with(Arc::clone(&platform) as _),
                cache,
                Arc::clone(&output) as _,
            )
            .expect("engine"),
        );
        engine.start().await;

        let router = create_router(AppContext {
            engine: Arc::clone(&engine),
            port: 5780,
        });

        Self {
            router,
            engine,
            platform,
            output,
            _cache_dir: cache_dir,
        }
    }

    /// Make an HTTP request to the test server
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Option<Value>) {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = match body {
            Some(json_body) => builder.body(Body::from(json_body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");

        let json_body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).expect("json body"))
        };
        (status, json_body)
    }

    pub async fn request_music(&self, query: &str, playlist: bool) -> (StatusCode, Option<Value>) {
        self.request(
            Method::POST,
            "/musiq/request_music",
            Some(json!({ "query": query, "playlist": playlist, "platform": "youtube" })),
        )
        .await
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> StatusCode {
        self.request(Method::POST, path, body).await.0
    }

    pub async fn state(&self) -> Value {
        let (status, body) = self.request(Method::GET, "/musiq/state", None).await;
        assert_eq!(status, StatusCode::OK);
        body.expect("state body")
    }

    /// Poll `/musiq/state` until `check` holds, like a polling client would
    pub async fn poll_state<F>(&self, check: F, timeout: Duration) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let start = Instant::now();
        loop {
            let state = self.state().await;
            if check(&state) {
                return state;
            }
            if start.elapsed() > timeout {
                panic!("state never matched within {:?}: {}", timeout, state);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Queue entries of a state body
pub fn queue_of(state: &Value) -> Vec<Value> {
    state["song_queue"].as_array().cloned().unwrap_or_default()
}

/// True if every queue entry is confirmed
pub fn all_confirmed(state: &Value) -> bool {
    queue_of(state).iter().all(|e| e["confirmed"] == true)
}
