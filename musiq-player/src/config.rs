//! Runtime queue settings for musiq-player
//!
//! Built once from the `[queue]` TOML section. The two bounds users may change
//! while the player runs (playlist item limit and radio fill count) are
//! atomics; everything else is fixed for the process lifetime.

use crate::error::{Error, Result};
use musiq_common::{PopPolicy, QueueSettings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared settings cell read by the resolver, pipeline and controller
#[derive(Debug)]
pub struct RuntimeSettings {
    max_playlist_items: AtomicUsize,
    radio_fill_count: AtomicUsize,
    pub autoplay_fill_count: usize,
    pub download_workers: usize,
    pub download_retries: u32,
    pub pop_policy: PopPolicy,
    pub refill_wait: Duration,
}

impl RuntimeSettings {
    /// Validate `settings` and build the runtime cell
    pub fn new(settings: &QueueSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            max_playlist_items: AtomicUsize::new(settings.max_playlist_items),
            radio_fill_count: AtomicUsize::new(settings.radio_fill_count),
            autoplay_fill_count: settings.autoplay_fill_count,
            download_workers: settings.download_workers,
            download_retries: settings.download_retries,
            pop_policy: settings.pop_policy,
            refill_wait: Duration::from_millis(settings.refill_wait_ms),
        })
    }

    pub fn max_playlist_items(&self) -> usize {
        self.max_playlist_items.load(Ordering::Relaxed)
    }

    /// Change the playlist import bound; applies to imports submitted afterwards
    pub fn set_max_playlist_items(&self, value: usize) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidInput(
                "max_playlist_items must be positive".to_string(),
            ));
        }
        self.max_playlist_items.store(value, Ordering::Relaxed);
        Ok(())
    }

    pub fn radio_fill_count(&self) -> usize {
        self.radio_fill_count.load(Ordering::Relaxed)
    }

    pub fn set_radio_fill_count(&self, value: usize) -> Result<()> {
        if value == 0 {
            return Err(Error::InvalidInput(
                "radio_fill_count must be positive".to_string(),
            ));
        }
        self.radio_fill_count.store(value, Ordering::Relaxed);
        Ok(())
    }
}
