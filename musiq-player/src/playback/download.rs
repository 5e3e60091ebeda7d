//! Download/confirm pipeline
//!
//! Turns a pending queue entry into a confirmed one: resolves full metadata
//! when the intent only carries a reference, then fetches the audio through
//! the cache. The pipeline never touches queue entries itself; it reports
//! progress through an [`EntryStateSink`] and the queue manager applies it.
//!
//! - At most `download_workers` fetches run at once (semaphore)
//! - At most one fetch runs per entry; a second `fetch` for the same entry
//!   awaits the outstanding one and returns its result
//! - Cancelling an entry's token abandons the fetch; a result produced after
//!   the entry was removed is discarded by the sink

use crate::cache::{AudioCache, AudioHandle};
use crate::config::RuntimeSettings;
use crate::error::{Error, Result};
use crate::platform::{PlatformClient, Platforms};
use crate::playback::types::{ConfirmedTrack, TrackIntent};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pause before retry `n` is `n * RETRY_BACKOFF`
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Terminal result of one fetch
pub type FetchOutcome = std::result::Result<ConfirmedTrack, FetchFailure>;

/// Why a fetch produced no track
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// Entry was removed or the pipeline shut down
    #[error("download cancelled")]
    Cancelled,
    /// Unrecoverable download or metadata error
    #[error("{0}")]
    Failed(String),
}

impl From<Error> for FetchFailure {
    fn from(err: Error) -> Self {
        FetchFailure::Failed(err.to_string())
    }
}

/// Receiver of entry state transitions requested by the pipeline
#[async_trait]
pub trait EntryStateSink: Send + Sync {
    /// Pending → Downloading; false if the entry is gone and the fetch should stop
    async fn begin_download(&self, entry_id: Uuid) -> bool;

    /// Downloading → Confirmed or Failed
    async fn finish_download(&self, entry_id: Uuid, outcome: &FetchOutcome);
}

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Bounded worker pool fetching metadata and audio for queue entries
pub struct DownloadPipeline {
    platforms: Arc<Platforms>,
    cache: Arc<dyn AudioCache>,
    workers: Arc<Semaphore>,
    retries: u32,
    inflight: Mutex<HashMap<Uuid, SharedFetch>>,
}

impl DownloadPipeline {
    pub fn new(platforms: Arc<Platforms>, cache: Arc<dyn AudioCache>, settings: &RuntimeSettings) -> Self {
        Self {
            platforms,
            cache,
            workers: Arc::new(Semaphore::new(settings.download_workers)),
            retries: settings.download_retries,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch metadata and audio for `entry_id`
    ///
    /// The work runs on its own task, so dropping the returned future does not
    /// abandon it; only `cancel` does.
    pub async fn fetch(
        self: &Arc<Self>,
        entry_id: Uuid,
        intent: TrackIntent,
        sink: Arc<dyn EntryStateSink>,
        cancel: CancellationToken,
    ) -> FetchOutcome {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(&entry_id) {
                Some(existing) => {
                    debug!("Fetch for entry {} already in flight", entry_id);
                    existing.clone()
                }
                None => {
                    let pipeline = Arc::clone(self);
                    let task = tokio::spawn(pipeline.run(entry_id, intent, sink, cancel));
                    let shared = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(FetchFailure::Failed(format!("download task aborted: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    // The task removes itself under this lock, so it cannot
                    // finish before the insert below
                    inflight.insert(entry_id, shared.clone());
                    shared
                }
            }
        };
        shared.await
    }

    /// Number of entries with an outstanding fetch
    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }

    /// Stop handing out worker slots; queued fetches end as cancelled
    pub fn shutdown(&self) {
        self.workers.close();
    }

    async fn run(
        self: Arc<Self>,
        entry_id: Uuid,
        intent: TrackIntent,
        sink: Arc<dyn EntryStateSink>,
        cancel: CancellationToken,
    ) -> FetchOutcome {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
            outcome = self.download(entry_id, &intent, sink.as_ref()) => outcome,
        };

        match &outcome {
            Ok(track) => info!("Entry {} confirmed: {}", entry_id, track.metadata.external_url),
            Err(FetchFailure::Cancelled) => debug!("Fetch for entry {} cancelled", entry_id),
            Err(FetchFailure::Failed(reason)) => {
                warn!("Entry {} failed ({}): {}", entry_id, intent.reference, reason)
            }
        }

        sink.finish_download(entry_id, &outcome).await;
        self.inflight.lock().await.remove(&entry_id);
        outcome
    }

    async fn download(
        &self,
        entry_id: Uuid,
        intent: &TrackIntent,
        sink: &dyn EntryStateSink,
    ) -> FetchOutcome {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| FetchFailure::Cancelled)?;

        if !sink.begin_download(entry_id).await {
            return Err(FetchFailure::Cancelled);
        }

        let client = self.platforms.get(intent.platform)?;
        let metadata = match &intent.resolved {
            Some(track) => track.clone(),
            None => client.resolve_url(&intent.reference).await?,
        };
        let audio = self
            .fetch_audio(client.as_ref(), &metadata.external_url)
            .await?;

        Ok(ConfirmedTrack { metadata, audio })
    }

    async fn fetch_audio(&self, client: &dyn PlatformClient, url: &str) -> Result<AudioHandle> {
        let mut attempt = 0;
        loop {
            match self.cache.get_or_fetch(url, client).await {
                Ok(handle) => return Ok(handle),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!("Download of {} failed (attempt {}): {}", url, attempt, e);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
