//! Event types for the musiq event system
//!
//! The core never pushes state to clients directly: callers poll a snapshot.
//! Events published here are an optional change-notification channel on top
//! of that, used by the SSE endpoint.

mod queue_types;

pub use queue_types::{EnqueueSource, QueueChangeTrigger};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Musiq event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MusiqEvent {
    /// Visible queue changed (entry added, removed, promoted or failed)
    QueueChanged {
        trigger: QueueChangeTrigger,
        /// Visible entries after the change
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Entry metadata and audio are ready to play
    EntryConfirmed {
        entry_id: Uuid,
        external_url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Entry could not be downloaded and left the visible queue
    EntryFailed {
        entry_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current song changed (None when playback went idle)
    CurrentSongChanged {
        entry_id: Option<Uuid>,
        external_url: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Autoplay flag toggled
    AutoplayChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Radio extension finished
    RadioRequested {
        seed_url: String,
        /// Entries actually enqueued
        added: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MusiqEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            MusiqEvent::QueueChanged { .. } => "QueueChanged",
            MusiqEvent::EntryConfirmed { .. } => "EntryConfirmed",
            MusiqEvent::EntryFailed { .. } => "EntryFailed",
            MusiqEvent::CurrentSongChanged { .. } => "CurrentSongChanged",
            MusiqEvent::AutoplayChanged { .. } => "AutoplayChanged",
            MusiqEvent::RadioRequested { .. } => "RadioRequested",
        }
    }
}

/// Central event distribution bus
///
/// Uses `tokio::broadcast` internally: publishing never blocks, slow
/// subscribers lag and lose old events instead of stalling the queue.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MusiqEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MusiqEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MusiqEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
