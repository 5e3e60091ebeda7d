//! Audio cache
//!
//! Downloaded audio lives in a flat folder, one file per canonical track URL.
//! Eviction is not handled here; files stay until something outside the player
//! removes them.

use crate::error::{Error, Result};
use crate::platform::PlatformClient;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// Locally available audio for one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub path: PathBuf,
    pub cache_key: String,
}

/// Keyed store of downloaded audio
///
/// Implementations must be idempotent and coalescing: concurrent calls for the
/// same URL perform at most one download, and a cached track is never fetched
/// again.
#[async_trait]
pub trait AudioCache: Send + Sync {
    async fn get_or_fetch(&self, canonical_url: &str, source: &dyn PlatformClient) -> Result<AudioHandle>;
}

/// Cache key for a canonical track URL (SHA-256, hex)
pub fn cache_key(canonical_url: &str) -> String {
    format!("{:x}", Sha256::digest(canonical_url.as_bytes()))
}

/// Folder-backed audio cache
pub struct DiskAudioCache {
    dir: PathBuf,
    /// Fetches in flight, one cell per key; dropped once the last caller
    /// waiting on it is done, so the disk stays the only record of a hit
    slots: Mutex<HashMap<String, Arc<OnceCell<AudioHandle>>>>,
}

impl DiskAudioCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of the audio for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.m4a", key))
    }

    async fn slot(&self, key: &str) -> Arc<OnceCell<AudioHandle>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Drop the slot for `key` if `slot` is its last user
    async fn release(&self, key: &str, slot: Arc<OnceCell<AudioHandle>>) {
        let mut slots = self.slots.lock().await;
        // Clones are only taken under this lock: map plus ours means nobody waits
        if slots.get(key).is_some_and(|s| Arc::ptr_eq(s, &slot)) && Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
    }

    async fn load_or_download(
        &self,
        canonical_url: &str,
        key: &str,
        source: &dyn PlatformClient,
    ) -> Result<AudioHandle> {
        let path = self.path_for(key);
        let handle = AudioHandle {
            path: path.clone(),
            cache_key: key.to_string(),
        };

        if tokio::fs::try_exists(&path).await? {
            debug!("Cache hit for {}", canonical_url);
            return Ok(handle);
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        // Download next to the final file and rename, so a crash never leaves
        // a truncated file that later looks like a hit
        let partial = self.dir.join(format!("{}.partial.m4a", key));
        info!("Downloading {} into cache", canonical_url);
        if let Err(e) = source.download(canonical_url, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| Error::Download(format!("Failed to store {}: {}", path.display(), e)))?;
        Ok(handle)
    }
}

#[async_trait]
impl AudioCache for DiskAudioCache {
    async fn get_or_fetch(&self, canonical_url: &str, source: &dyn PlatformClient) -> Result<AudioHandle> {
        let key = cache_key(canonical_url);
        let slot = self.slot(&key).await;

        // A failed init leaves the cell empty, so the next caller retries
        let result = slot
            .get_or_try_init(|| self.load_or_download(canonical_url, &key, source))
            .await
            .cloned();
        self.release(&key, slot).await;
        result
    }
}
