//! Radio/autoplay extension engine
//!
//! Extends the queue with tracks the platform relates to a seed track. Used by
//! explicit radio requests and by autoplay when the queue runs dry. Platform
//! failures end here: they are logged and the extension simply adds nothing.

use crate::error::Result;
use crate::platform::{Platforms, TrackInfo};
use crate::playback::queue_manager::QueueManager;
use crate::playback::types::TrackIntent;
use musiq_common::events::EnqueueSource;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct ExtensionEngine {
    platforms: Arc<Platforms>,
    queue: Arc<QueueManager>,
}

impl ExtensionEngine {
    pub fn new(platforms: Arc<Platforms>, queue: Arc<QueueManager>) -> Self {
        Self { platforms, queue }
    }

    /// Up to `count` related tracks not equal to the seed or anything in `exclude`
    ///
    /// Candidates keep the order the platform returned them in.
    pub async fn related_intents(
        &self,
        seed: &TrackInfo,
        count: usize,
        source: EnqueueSource,
        exclude: &[String],
    ) -> Result<Vec<TrackIntent>> {
        let client = self.platforms.get(seed.platform)?;

        // One spare candidate, since the platform often lists the seed itself
        let candidates = client.related_tracks(seed, count + 1).await?;

        let mut seen: HashSet<&str> = exclude.iter().map(String::as_str).collect();
        seen.insert(seed.external_url.as_str());

        let mut intents = Vec::with_capacity(count);
        for stub in &candidates {
            if intents.len() == count {
                break;
            }
            if !seen.insert(stub.external_url.as_str()) {
                debug!("Skipping related track {} (already known)", stub.external_url);
                continue;
            }
            intents.push(TrackIntent {
                platform: seed.platform,
                reference: stub.external_url.clone(),
                requester: source.to_string().to_lowercase(),
                from_playlist: false,
                source,
                resolved: None,
                title_hint: stub.title.clone(),
            });
        }
        Ok(intents)
    }

    /// Enqueue related tracks one at a time; errors are logged, never returned
    pub async fn extend(
        &self,
        seed: &TrackInfo,
        count: usize,
        source: EnqueueSource,
        exclude: &[String],
    ) -> Vec<Uuid> {
        let intents = match self.related_intents(seed, count, source, exclude).await {
            Ok(intents) => intents,
            Err(e) => {
                warn!("{} extension from {} failed: {}", source, seed.external_url, e);
                return Vec::new();
            }
        };

        let mut ids = Vec::with_capacity(intents.len());
        for intent in intents {
            ids.push(self.queue.enqueue(intent).await);
        }
        info!(
            "{} extension from {} added {} entries",
            source,
            seed.external_url,
            ids.len()
        );
        ids
    }
}
