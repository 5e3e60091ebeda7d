//! Player engine
//!
//! One [`MusiqEngine`] owns one queue instance: the resolver, download
//! pipeline, queue manager, extension engine and playback controller, wired
//! together at construction. Nothing here is global; the HTTP layer and tests
//! hold the engine behind an `Arc`.

use crate::cache::AudioCache;
use crate::config::RuntimeSettings;
use crate::error::{Error, Result};
use crate::output::AudioOutput;
use crate::platform::Platforms;
use crate::playback::controller::PlaybackController;
use crate::playback::download::DownloadPipeline;
use crate::playback::extension::ExtensionEngine;
use crate::playback::queue_manager::QueueManager;
use crate::playback::resolver::{RequestResolver, SongRequest};
use crate::playback::types::{MusiqState, SongView};
use musiq_common::events::{EventBus, MusiqEvent};
use musiq_common::QueueSettings;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// Event bus capacity; slow SSE clients lag rather than block the core
const EVENT_CAPACITY: usize = 256;

pub struct MusiqEngine {
    settings: Arc<RuntimeSettings>,
    resolver: RequestResolver,
    queue: Arc<QueueManager>,
    controller: Arc<PlaybackController>,
    events: EventBus,
    playback_task: Mutex<Option<JoinHandle<()>>>,
}

impl MusiqEngine {
    /// Build every component for one queue instance
    ///
    /// Nothing runs until [`start`](Self::start).
    pub fn new(
        queue_settings: &QueueSettings,
        platforms: Platforms,
        cache: Arc<dyn AudioCache>,
        output: Arc<dyn AudioOutput>,
    ) -> Result<Self> {
        let settings = Arc::new(RuntimeSettings::new(queue_settings)?);
        let platforms = Arc::new(platforms);
        let events = EventBus::new(EVENT_CAPACITY);

        let pipeline = Arc::new(DownloadPipeline::new(Arc::clone(&platforms), cache, &settings));
        let queue = Arc::new(QueueManager::new(pipeline, events.clone(), settings.pop_policy));
        let extension = ExtensionEngine::new(Arc::clone(&platforms), Arc::clone(&queue));
        let controller = Arc::new(PlaybackController::new(
            Arc::clone(&queue),
            extension,
            output,
            Arc::clone(&settings),
            events.clone(),
        ));
        let resolver = RequestResolver::new(platforms, Arc::clone(&settings));

        Ok(Self {
            settings,
            resolver,
            queue,
            controller,
            events,
            playback_task: Mutex::new(None),
        })
    }

    /// Spawn the playback task; calling it again has no effect
    pub async fn start(&self) {
        let mut task = self.playback_task.lock().await;
        if task.is_none() {
            info!(
                "Starting musiq engine (pop policy {:?}, {} download workers)",
                self.settings.pop_policy, self.settings.download_workers
            );
            *task = Some(tokio::spawn(Arc::clone(&self.controller).run()));
        }
    }

    /// Stop playback, cancel every download and wait for the playback task
    pub async fn shutdown(&self) {
        info!("Shutting down musiq engine");
        self.controller.shutdown();
        self.queue.shutdown();
        if let Some(task) = self.playback_task.lock().await.take() {
            if let Err(e) = task.await {
                warn!("Playback task ended abnormally: {}", e);
            }
        }
    }

    /// Resolve and enqueue a request
    ///
    /// Returns once the entries are visible (Pending); downloads continue in
    /// the background. Resolution errors are returned here and nothing is
    /// enqueued.
    pub async fn submit_request(&self, request: SongRequest) -> Result<Vec<Uuid>> {
        let intents = self.resolver.resolve(&request).await?;
        Ok(self.queue.enqueue_all(intents).await)
    }

    pub async fn skip(&self) -> Option<SongView> {
        self.controller.skip().await
    }

    /// Remove a queued entry, or skip it if it is the current song
    pub async fn remove(&self, entry_id: Uuid) -> Result<()> {
        if self.queue.remove(entry_id).await {
            return Ok(());
        }
        if self.controller.current_entry().await == Some(entry_id) {
            // Advances only if it is still current by now
            self.controller.track_finished(entry_id).await;
            return Ok(());
        }
        Err(Error::Queue(format!("Entry {} is not in the queue", entry_id)))
    }

    /// Remove every queued entry; the current song keeps playing
    pub async fn remove_all(&self) -> usize {
        self.queue.remove_all().await
    }

    pub async fn set_autoplay(&self, enabled: bool) {
        self.controller.set_autoplay(enabled).await;
    }

    /// Extend the queue from the current or last played song
    pub async fn request_radio(&self) -> Result<usize> {
        self.controller.request_radio().await
    }

    /// Bound for playlist imports submitted from now on
    pub fn set_max_playlist_items(&self, value: usize) -> Result<()> {
        self.settings.set_max_playlist_items(value)?;
        info!("max_playlist_items set to {}", value);
        Ok(())
    }

    pub fn set_radio_fill_count(&self, value: usize) -> Result<()> {
        self.settings.set_radio_fill_count(value)?;
        info!("radio_fill_count set to {}", value);
        Ok(())
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Point-in-time view for polling clients
    pub async fn get_state(&self) -> MusiqState {
        self.controller.state().await
    }

    /// Change notifications; see [`MusiqEvent`]
    pub fn subscribe(&self) -> broadcast::Receiver<MusiqEvent> {
        self.events.subscribe()
    }
}
