//! Queue Manager
//!
//! Owns the ordered sequence of queue entries. Every mutation goes through one
//! write lock, so [`QueueManager::snapshot`] always sees a whole mutation or
//! none of it.
//!
//! Entries enter as Pending and a fetch is started for them straight away.
//! The download pipeline reports back through [`EntryStateSink`]; results for
//! entries that were removed in the meantime are dropped here.

use crate::playback::download::{DownloadPipeline, EntryStateSink, FetchFailure, FetchOutcome};
use crate::playback::types::{EntryState, EntryView, QueueEntry, TrackIntent};
use async_trait::async_trait;
use chrono::Utc;
use musiq_common::events::{EventBus, MusiqEvent, QueueChangeTrigger};
use musiq_common::PopPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct QueueInner {
    /// Visible entries in insertion order
    entries: Vec<QueueEntry>,
    next_order: u64,
    /// Download cancellation per visible entry
    tokens: HashMap<Uuid, CancellationToken>,
}

impl QueueInner {
    fn position(&self, entry_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.id == entry_id)
    }

    /// Take an entry out of the visible sequence, cancelling its download
    fn evict(&mut self, index: usize, state: EntryState) -> QueueEntry {
        let mut entry = self.entries.remove(index);
        if let Some(token) = self.tokens.remove(&entry.id) {
            token.cancel();
        }
        entry.state = state;
        entry
    }
}

/// Ordered, lock-guarded queue of song entries
pub struct QueueManager {
    inner: RwLock<QueueInner>,
    pipeline: Arc<DownloadPipeline>,
    events: EventBus,
    policy: PopPolicy,
    /// Bumped on every visible change; the playback loop waits on it
    version: watch::Sender<u64>,
    /// Parent of every entry token; cancelled on shutdown
    shutdown: CancellationToken,
}

impl QueueManager {
    /// Create new empty queue manager
    pub fn new(pipeline: Arc<DownloadPipeline>, events: EventBus, policy: PopPolicy) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: RwLock::new(QueueInner {
                entries: Vec::new(),
                next_order: 0,
                tokens: HashMap::new(),
            }),
            pipeline,
            events,
            policy,
            version,
            shutdown: CancellationToken::new(),
        }
    }

    /// Append one entry and start fetching it
    pub async fn enqueue(self: &Arc<Self>, intent: TrackIntent) -> Uuid {
        let ids = self.enqueue_all(vec![intent]).await;
        ids[0]
    }

    /// Append entries as one contiguous block, in the given order
    ///
    /// Concurrent enqueues never interleave with the block, so a playlist stays
    /// together. Returns immediately; downloads run in the background.
    pub async fn enqueue_all(self: &Arc<Self>, intents: Vec<TrackIntent>) -> Vec<Uuid> {
        if intents.is_empty() {
            return Vec::new();
        }

        let trigger = intents[0].source.trigger();
        let mut started = Vec::with_capacity(intents.len());
        let queue_len = {
            let mut inner = self.inner.write().await;
            for intent in intents {
                let entry = QueueEntry {
                    id: Uuid::new_v4(),
                    intent,
                    state: EntryState::Pending,
                    order: inner.next_order,
                    enqueued_at: Utc::now(),
                };
                inner.next_order += 1;

                let token = self.shutdown.child_token();
                inner.tokens.insert(entry.id, token.clone());
                debug!(
                    "Enqueued entry {} (order {}): {}",
                    entry.id, entry.order, entry.intent.reference
                );
                started.push((entry.id, entry.intent.clone(), token));
                inner.entries.push(entry);
            }
            inner.entries.len()
        };

        let ids = started.iter().map(|(id, _, _)| *id).collect();
        for (entry_id, intent, token) in started {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                let pipeline = Arc::clone(&queue.pipeline);
                let sink: Arc<dyn EntryStateSink> = queue;
                pipeline.fetch(entry_id, intent, sink, token).await;
            });
        }

        self.changed(trigger, queue_len);
        ids
    }

    /// Remove one visible entry; false if it is not in the queue
    pub async fn remove(&self, entry_id: Uuid) -> bool {
        let queue_len = {
            let mut inner = self.inner.write().await;
            let Some(index) = inner.position(entry_id) else {
                return false;
            };
            inner.evict(index, EntryState::Removed);
            inner.entries.len()
        };
        info!("Removed entry {}", entry_id);
        self.changed(QueueChangeTrigger::UserDequeue, queue_len);
        true
    }

    /// Remove every visible entry, cancelling outstanding downloads
    ///
    /// Returns the number of entries removed.
    pub async fn remove_all(&self) -> usize {
        let removed = {
            let mut inner = self.inner.write().await;
            let count = inner.entries.len();
            for (_, token) in inner.tokens.drain() {
                token.cancel();
            }
            inner.entries.clear();
            count
        };
        if removed > 0 {
            info!("Removed all {} queue entries", removed);
            self.changed(QueueChangeTrigger::UserDequeue, 0);
        }
        removed
    }

    /// Ordered visible entries at one point in time
    pub async fn snapshot(&self) -> Vec<EntryView> {
        let inner = self.inner.read().await;
        inner.entries.iter().map(QueueEntry::view).collect()
    }

    /// Canonical URLs of all visible entries
    pub async fn visible_urls(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .map(|e| e.external_url().to_string())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Take the next playable entry out of the queue
    ///
    /// Under `HeadOfLine` only a confirmed head is taken, so an unconfirmed
    /// early entry holds back later ones. Under `FirstConfirmed` the earliest
    /// confirmed entry is taken and unconfirmed ones stay where they are.
    pub async fn pop_next(&self) -> Option<QueueEntry> {
        let (entry, queue_len) = {
            let mut inner = self.inner.write().await;
            let index = match self.policy {
                PopPolicy::HeadOfLine => inner
                    .entries
                    .first()
                    .filter(|e| e.is_confirmed())
                    .map(|_| 0),
                PopPolicy::FirstConfirmed => inner.entries.iter().position(QueueEntry::is_confirmed),
            }?;
            let entry = inner.entries.remove(index);
            inner.tokens.remove(&entry.id);
            (entry, inner.entries.len())
        };
        debug!("Promoting entry {}", entry.id);
        self.changed(QueueChangeTrigger::Promotion, queue_len);
        Some(entry)
    }

    /// Version counter bumped on every visible change
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Cancel every download and stop the pipeline
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.pipeline.shutdown();
    }

    fn changed(&self, trigger: QueueChangeTrigger, queue_len: usize) {
        self.version.send_modify(|v| *v += 1);
        self.events.emit_lossy(MusiqEvent::QueueChanged {
            trigger,
            queue_len,
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl EntryStateSink for QueueManager {
    async fn begin_download(&self, entry_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let Some(index) = inner.position(entry_id) else {
            return false;
        };
        let entry = &mut inner.entries[index];
        match entry.state {
            EntryState::Pending => {
                entry.state = EntryState::Downloading;
                true
            }
            EntryState::Downloading => true,
            _ => false,
        }
    }

    async fn finish_download(&self, entry_id: Uuid, outcome: &FetchOutcome) {
        let mut inner = self.inner.write().await;
        let Some(index) = inner.position(entry_id) else {
            debug!("Discarding fetch result for removed entry {}", entry_id);
            return;
        };

        match outcome {
            Ok(track) => {
                let entry = &mut inner.entries[index];
                if entry.is_confirmed() {
                    // Metadata of a confirmed entry never changes
                    return;
                }
                entry.state = EntryState::Confirmed(track.clone());
                inner.tokens.remove(&entry_id);
                let queue_len = inner.entries.len();
                drop(inner);

                self.events.emit_lossy(MusiqEvent::EntryConfirmed {
                    entry_id,
                    external_url: track.metadata.external_url.clone(),
                    timestamp: Utc::now(),
                });
                self.version.send_modify(|v| *v += 1);
                debug!("Queue length {} after confirming {}", queue_len, entry_id);
            }
            Err(FetchFailure::Failed(reason)) => {
                let entry = inner.evict(index, EntryState::Failed(reason.clone()));
                let queue_len = inner.entries.len();
                drop(inner);

                warn!(
                    "Dropping entry {} ({}) from queue: {}",
                    entry_id, entry.intent.reference, reason
                );
                self.events.emit_lossy(MusiqEvent::EntryFailed {
                    entry_id,
                    reason: reason.clone(),
                    timestamp: Utc::now(),
                });
                self.changed(QueueChangeTrigger::DownloadFailed, queue_len);
            }
            Err(FetchFailure::Cancelled) => {
                // Only shutdown cancels a visible entry; leave it as it is
                debug!("Fetch for visible entry {} cancelled", entry_id);
            }
        }
    }
}
