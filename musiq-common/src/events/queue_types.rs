//! Queue change type definitions
//!
//! Supporting types describing who changed the queue and why.

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    UserDequeue,
    Autoplay,
    Radio,
    Promotion,
    DownloadFailed,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::UserDequeue => write!(f, "UserDequeue"),
            QueueChangeTrigger::Autoplay => write!(f, "Autoplay"),
            QueueChangeTrigger::Radio => write!(f, "Radio"),
            QueueChangeTrigger::Promotion => write!(f, "Promotion"),
            QueueChangeTrigger::DownloadFailed => write!(f, "DownloadFailed"),
        }
    }
}

/// How a track entered the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EnqueueSource {
    /// Submitted by a user request
    Manual,
    /// Added by autoplay when the queue ran dry
    Autoplay,
    /// Added by an explicit radio request
    Radio,
}

impl EnqueueSource {
    /// Queue change trigger reported when an entry from this source is enqueued
    pub fn trigger(self) -> QueueChangeTrigger {
        match self {
            EnqueueSource::Manual => QueueChangeTrigger::UserEnqueue,
            EnqueueSource::Autoplay => QueueChangeTrigger::Autoplay,
            EnqueueSource::Radio => QueueChangeTrigger::Radio,
        }
    }
}

impl std::fmt::Display for EnqueueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueSource::Manual => write!(f, "Manual"),
            EnqueueSource::Autoplay => write!(f, "Autoplay"),
            EnqueueSource::Radio => write!(f, "Radio"),
        }
    }
}
