//! Playback controller
//!
//! Owns the current song and the autoplay flag. A single playback task
//! ([`PlaybackController::run`]) hands the current song to the audio output,
//! promotes the next confirmed entry whenever the player is idle, and keeps an
//! autoplay queue from running dry.
//!
//! Lock order is controller state, then queue. Nothing holds the queue lock
//! while waiting for the controller.

use crate::config::RuntimeSettings;
use crate::error::{Error, Result};
use crate::output::AudioOutput;
use crate::platform::TrackInfo;
use crate::playback::extension::ExtensionEngine;
use crate::playback::queue_manager::QueueManager;
use crate::playback::types::{CurrentSong, MusiqState, PlaybackStatus, QueueEntry, SongView};
use chrono::Utc;
use musiq_common::events::{EnqueueSource, EventBus, MusiqEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct ControllerState {
    current: Option<CurrentSong>,
    /// Seed for radio and autoplay once nothing is playing
    last_played: Option<TrackInfo>,
    autoplay: bool,
    /// Current song for which the exhausted queue was already refilled
    refilled_for: Option<Uuid>,
}

impl ControllerState {
    fn seed(&self) -> Option<TrackInfo> {
        self.current
            .as_ref()
            .map(|c| c.track.metadata.clone())
            .or_else(|| self.last_played.clone())
    }

    /// Replace the current song, remembering the outgoing one
    fn replace_current(&mut self, next: Option<CurrentSong>) {
        if let Some(previous) = self.current.take() {
            self.last_played = Some(previous.track.metadata);
        }
        self.current = next;
    }
}

pub struct PlaybackController {
    state: RwLock<ControllerState>,
    queue: Arc<QueueManager>,
    extension: ExtensionEngine,
    output: Arc<dyn AudioOutput>,
    settings: Arc<RuntimeSettings>,
    events: EventBus,
    /// Bumped whenever the current song changes; interrupts playback
    current_version: watch::Sender<u64>,
    /// Bumped when autoplay is toggled
    control_version: watch::Sender<u64>,
    refilling: AtomicBool,
    shutdown: CancellationToken,
}

impl PlaybackController {
    pub fn new(
        queue: Arc<QueueManager>,
        extension: ExtensionEngine,
        output: Arc<dyn AudioOutput>,
        settings: Arc<RuntimeSettings>,
        events: EventBus,
    ) -> Self {
        let (current_version, _) = watch::channel(0);
        let (control_version, _) = watch::channel(0);
        Self {
            state: RwLock::new(ControllerState::default()),
            queue,
            extension,
            output,
            settings,
            events,
            current_version,
            control_version,
            refilling: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Discard the current song and promote the next confirmed entry
    ///
    /// With autoplay on and nothing left to promote, waits up to
    /// `refill_wait` for the autoplay extension to enqueue new entries; the
    /// playback task promotes them once they are confirmed.
    pub async fn skip(self: &Arc<Self>) -> Option<SongView> {
        self.advance(None).await
    }

    /// Advance past a track that finished on its own
    ///
    /// Does nothing if `entry_id` is no longer current (skipped meanwhile).
    pub async fn track_finished(self: &Arc<Self>, entry_id: Uuid) -> Option<SongView> {
        self.advance(Some(entry_id)).await
    }

    pub async fn set_autoplay(&self, enabled: bool) {
        {
            let mut state = self.state.write().await;
            if state.autoplay == enabled {
                return;
            }
            state.autoplay = enabled;
            if enabled {
                state.refilled_for = None;
            }
        }
        info!("Autoplay {}", if enabled { "enabled" } else { "disabled" });
        self.control_version.send_modify(|v| *v += 1);
        self.events.emit_lossy(MusiqEvent::AutoplayChanged {
            enabled,
            timestamp: Utc::now(),
        });
    }

    pub async fn autoplay(&self) -> bool {
        self.state.read().await.autoplay
    }

    /// Extend the queue from the current (or last played) song
    ///
    /// Independent of autoplay. Returns the number of entries added; platform
    /// failures add nothing but are not errors.
    pub async fn request_radio(&self) -> Result<usize> {
        let (seed, exclude) = {
            let state = self.state.read().await;
            let seed = state
                .seed()
                .ok_or_else(|| Error::InvalidState("Nothing has been played yet".to_string()))?;
            (seed, self.known_urls(&state).await)
        };

        let count = self.settings.radio_fill_count();
        info!("Radio requested from {} ({} tracks)", seed.external_url, count);
        let added = self
            .extension
            .extend(&seed, count, EnqueueSource::Radio, &exclude)
            .await
            .len();

        self.events.emit_lossy(MusiqEvent::RadioRequested {
            seed_url: seed.external_url,
            added,
            timestamp: Utc::now(),
        });
        Ok(added)
    }

    /// Current song and visible queue at one point in time
    pub async fn state(&self) -> MusiqState {
        let state = self.state.read().await;
        // Queue snapshot taken under the state lock: no promotion can land
        // between the two reads
        let song_queue = self.queue.snapshot().await;
        let current_song = state.current.as_ref().map(CurrentSong::view);

        let radio_active = current_song
            .iter()
            .map(|s| s.source)
            .chain(song_queue.iter().map(|e| e.source))
            .any(|source| source == EnqueueSource::Radio);

        MusiqState {
            status: if current_song.is_some() {
                PlaybackStatus::Playing
            } else {
                PlaybackStatus::Idle
            },
            current_song,
            song_queue,
            autoplay: state.autoplay,
            radio_active,
        }
    }

    pub async fn current_entry(&self) -> Option<Uuid> {
        self.state.read().await.current.as_ref().map(|c| c.entry_id)
    }

    /// Stop the playback task and whatever it is playing
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Playback task; runs until [`shutdown`](Self::shutdown)
    pub async fn run(self: Arc<Self>) {
        info!("Playback task started");
        let mut current_rx = self.current_version.subscribe();
        let mut queue_rx = self.queue.subscribe_changes();
        let mut control_rx = self.control_version.subscribe();

        loop {
            current_rx.borrow_and_update();
            let current = self.state.read().await.current.clone();

            match current {
                Some(song) => {
                    let play = self.output.play(&song.track);
                    tokio::pin!(play);

                    loop {
                        queue_rx.borrow_and_update();
                        control_rx.borrow_and_update();
                        self.refill_if_exhausted().await;

                        tokio::select! {
                            result = &mut play => {
                                if let Err(e) = result {
                                    warn!("Playback of {} failed: {}", song.track.metadata.external_url, e);
                                }
                                self.track_finished(song.entry_id).await;
                                break;
                            }
                            _ = current_rx.changed() => break,
                            _ = queue_rx.changed() => {}
                            _ = control_rx.changed() => {}
                            _ = self.shutdown.cancelled() => {
                                info!("Playback task stopped");
                                return;
                            }
                        }
                    }
                }
                None => {
                    queue_rx.borrow_and_update();
                    if self.promote_if_idle().await {
                        continue;
                    }

                    tokio::select! {
                        _ = queue_rx.changed() => {}
                        _ = current_rx.changed() => {}
                        _ = self.shutdown.cancelled() => {
                            info!("Playback task stopped");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn advance(self: &Arc<Self>, expected: Option<Uuid>) -> Option<SongView> {
        let (view, refill_seed) = {
            let mut state = self.state.write().await;
            if let Some(expected) = expected {
                if state.current.as_ref().map(|c| c.entry_id) != Some(expected) {
                    return state.current.as_ref().map(CurrentSong::view);
                }
            }

            let next = self.queue.pop_next().await.and_then(QueueEntry::into_current);
            state.replace_current(next);

            let refill_seed = if state.current.is_none() && state.autoplay && self.queue.is_empty().await {
                state.last_played.clone()
            } else {
                None
            };
            (state.current.as_ref().map(CurrentSong::view), refill_seed)
        };
        self.current_changed(view.as_ref());

        if let Some(seed) = refill_seed {
            if let Some(handle) = self.spawn_refill(seed) {
                tokio::select! {
                    waited = tokio::time::timeout(self.settings.refill_wait, handle) => match waited {
                        Ok(Ok(added)) => debug!("Autoplay refill added {} entries", added),
                        Ok(Err(e)) => warn!("Autoplay refill task failed: {}", e),
                        Err(_) => debug!("Autoplay refill still running; going idle"),
                    },
                    _ = self.shutdown.cancelled() => {
                        debug!("Shutdown while waiting for autoplay refill");
                    }
                }
            }
        }
        view
    }

    async fn promote_if_idle(&self) -> bool {
        let view = {
            let mut state = self.state.write().await;
            if state.current.is_some() {
                return false;
            }
            let Some(next) = self.queue.pop_next().await.and_then(QueueEntry::into_current) else {
                return false;
            };
            state.replace_current(Some(next));
            state.current.as_ref().map(CurrentSong::view)
        };
        self.current_changed(view.as_ref());
        true
    }

    /// Autoplay: keep one step ahead while a song plays and the queue is empty
    async fn refill_if_exhausted(self: &Arc<Self>) {
        let seed = {
            let mut state = self.state.write().await;
            if !state.autoplay {
                return;
            }
            let Some((current_id, seed)) = state
                .current
                .as_ref()
                .map(|c| (c.entry_id, c.track.metadata.clone()))
            else {
                return;
            };
            if state.refilled_for == Some(current_id) || !self.queue.is_empty().await {
                return;
            }
            state.refilled_for = Some(current_id);
            seed
        };
        debug!("Queue exhausted; refilling from {}", seed.external_url);
        self.spawn_refill(seed);
    }

    /// Start an autoplay extension unless one is already running
    fn spawn_refill(self: &Arc<Self>, seed: TrackInfo) -> Option<JoinHandle<usize>> {
        if self.refilling.swap(true, Ordering::SeqCst) {
            debug!("Autoplay refill already running");
            return None;
        }

        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            let exclude = {
                let state = controller.state.read().await;
                controller.known_urls(&state).await
            };
            let added = controller
                .extension
                .extend(
                    &seed,
                    controller.settings.autoplay_fill_count,
                    EnqueueSource::Autoplay,
                    &exclude,
                )
                .await
                .len();
            controller.refilling.store(false, Ordering::SeqCst);
            added
        }))
    }

    /// URLs an extension must not add again
    async fn known_urls(&self, state: &ControllerState) -> Vec<String> {
        let mut urls = self.queue.visible_urls().await;
        urls.extend(state.current.iter().map(|c| c.track.metadata.external_url.clone()));
        urls.extend(state.last_played.iter().map(|t| t.external_url.clone()));
        urls
    }

    fn current_changed(&self, view: Option<&SongView>) {
        match view {
            Some(song) => info!(
                "Now playing {} - {} ({})",
                song.artist, song.title, song.external_url
            ),
            None => info!("Playback idle"),
        }
        self.current_version.send_modify(|v| *v += 1);
        self.events.emit_lossy(MusiqEvent::CurrentSongChanged {
            entry_id: view.map(|s| s.id),
            external_url: view.map(|s| s.external_url.clone()),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platforms;
    use crate::playback::download::DownloadPipeline;
    use crate::test_support::{eventually, intent_for, ManualOutput, MemoryCache, MockPlatform, MockTrack};
    use futures::FutureExt;
    use musiq_common::{PopPolicy, QueueSettings};

    struct Fixture {
        platform: Arc<MockPlatform>,
        queue: Arc<QueueManager>,
        controller: Arc<PlaybackController>,
        output: Arc<ManualOutput>,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(MockPlatform::new());
        let settings = Arc::new(
            RuntimeSettings::new(&QueueSettings {
                download_retries: 0,
                refill_wait_ms: 1_000,
                ..QueueSettings::default()
            })
            .unwrap(),
        );
        let platforms = Arc::new(Platforms::new().with(Arc::clone(&platform) as _));
        let pipeline = Arc::new(DownloadPipeline::new(
            Arc::clone(&platforms),
            Arc::new(MemoryCache::new()),
            &settings,
        ));
        let events = EventBus::new(64);
        let queue = Arc::new(QueueManager::new(pipeline, events.clone(), PopPolicy::HeadOfLine));
        let extension = ExtensionEngine::new(platforms, Arc::clone(&queue));
        let output = Arc::new(ManualOutput::new());
        let controller = Arc::new(PlaybackController::new(
            Arc::clone(&queue),
            extension,
            Arc::clone(&output) as _,
            settings,
            events,
        ));
        Fixture {
            platform,
            queue,
            controller,
            output,
        }
    }

    async fn until<F>(controller: &Arc<PlaybackController>, check: F) -> MusiqState
    where
        F: Fn(&MusiqState) -> bool + Send + Sync + 'static,
    {
        let check = Arc::new(check);
        let c = Arc::clone(controller);
        let probe = Arc::clone(&check);
        assert!(
            eventually(move || {
                let c = Arc::clone(&c);
                let probe = Arc::clone(&probe);
                async move { probe(&c.state().await) }.boxed()
            })
            .await,
            "state never matched"
        );
        controller.state().await
    }

    #[tokio::test]
    async fn test_idle_player_promotes_first_confirmed_entry() {
        let f = fixture();
        f.platform.add(MockTrack::new("w8KQmps-Sog", "Artist - Song", 200));
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("w8KQmps-Sog"))).await;

        let state = until(&f.controller, |s| s.current_song.is_some()).await;
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert!(state.song_queue.is_empty());
        assert_eq!(state.current_song.unwrap().title, "Song");
        f.controller.shutdown();
    }

    #[tokio::test]
    async fn test_remove_all_then_skip_goes_idle() {
        let f = fixture();
        f.platform.add(MockTrack::new("aaaaaaaaaa1", "A - One", 200));
        f.platform.add(MockTrack::new("aaaaaaaaaa2", "A - Two", 200));
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("aaaaaaaaaa1"))).await;
        f.queue.enqueue(intent_for(&f.platform.url_of("aaaaaaaaaa2"))).await;
        until(&f.controller, |s| s.current_song.is_some()).await;

        f.queue.remove_all().await;
        assert!(f.controller.skip().await.is_none());

        let state = f.controller.state().await;
        assert_eq!(state.status, PlaybackStatus::Idle);
        assert!(state.current_song.is_none());
        assert!(state.song_queue.is_empty());
        f.controller.shutdown();
    }

    #[tokio::test]
    async fn test_natural_end_advances_queue() {
        let f = fixture();
        f.platform.add(MockTrack::new("aaaaaaaaaa1", "A - One", 200));
        f.platform.add(MockTrack::new("aaaaaaaaaa2", "A - Two", 200));
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue
            .enqueue_all(vec![
                intent_for(&f.platform.url_of("aaaaaaaaaa1")),
                intent_for(&f.platform.url_of("aaaaaaaaaa2")),
            ])
            .await;
        until(&f.controller, |s| {
            s.current_song.as_ref().is_some_and(|c| c.title == "One")
                && s.song_queue.len() == 1
                && s.song_queue[0].confirmed
        })
        .await;

        f.output.finish_current();
        until(&f.controller, |s| {
            s.current_song.as_ref().is_some_and(|c| c.title == "Two") && s.song_queue.is_empty()
        })
        .await;
        let output = Arc::clone(&f.output);
        assert!(
            eventually(move || {
                let output = Arc::clone(&output);
                async move { output.played().len() == 2 }.boxed()
            })
            .await
        );
        f.controller.shutdown();
    }

    #[tokio::test]
    async fn test_skip_with_autoplay_refills_empty_queue() {
        let f = fixture();
        f.platform.add(MockTrack::new("w8KQmps-Sog", "Seed - Song", 200).with_related(&["rrrrrrrrrr1"]));
        f.platform.add(MockTrack::new("rrrrrrrrrr1", "Next - Song", 180));
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("w8KQmps-Sog"))).await;
        let before = until(&f.controller, |s| s.current_song.is_some()).await;
        let seed_id = before.current_song.unwrap().id;

        f.controller.set_autoplay(true).await;
        f.controller.skip().await;

        let state = until(&f.controller, |s| s.current_song.is_some()).await;
        let current = state.current_song.unwrap();
        assert_ne!(current.id, seed_id);
        assert_eq!(current.external_url, f.platform.url_of("rrrrrrrrrr1"));
        assert_eq!(current.source, EnqueueSource::Autoplay);
        f.controller.shutdown();
    }

    #[tokio::test]
    async fn test_skip_without_autoplay_does_not_refill() {
        let f = fixture();
        f.platform.add(MockTrack::new("w8KQmps-Sog", "Seed - Song", 200).with_related(&["rrrrrrrrrr1"]));
        f.platform.add(MockTrack::new("rrrrrrrrrr1", "Next - Song", 180));
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("w8KQmps-Sog"))).await;
        until(&f.controller, |s| s.current_song.is_some()).await;

        assert!(f.controller.skip().await.is_none());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let state = f.controller.state().await;
        assert!(state.current_song.is_none());
        assert!(state.song_queue.is_empty());
        f.controller.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_refill_wait() {
        let f = fixture();
        f.platform.add(MockTrack::new("w8KQmps-Sog", "Seed - Song", 200));
        let runner = tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("w8KQmps-Sog"))).await;
        until(&f.controller, |s| s.current_song.is_some()).await;
        // First refill runs while the seed plays and finds nothing
        f.controller.set_autoplay(true).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // The end-of-track refill hangs on the related lookup
        f.platform.hang_related();
        f.output.finish_current();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        f.controller.shutdown();
        tokio::time::timeout(std::time::Duration::from_millis(500), runner)
            .await
            .expect("playback task should stop without waiting out the refill")
            .unwrap();
    }

    #[tokio::test]
    async fn test_radio_requires_a_seed() {
        let f = fixture();
        assert!(matches!(
            f.controller.request_radio().await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_radio_uses_last_played_when_idle() {
        let f = fixture();
        f.platform.add(
            MockTrack::new("w8KQmps-Sog", "Seed - Song", 200)
                .with_related(&["rrrrrrrrrr1", "rrrrrrrrrr2"]),
        );
        for id in ["rrrrrrrrrr1", "rrrrrrrrrr2"] {
            f.platform.add(MockTrack::new(id, "Radio - Song", 100).with_delay_ms(5_000));
        }
        tokio::spawn(Arc::clone(&f.controller).run());

        f.queue.enqueue(intent_for(&f.platform.url_of("w8KQmps-Sog"))).await;
        until(&f.controller, |s| s.current_song.is_some()).await;
        f.controller.skip().await;

        assert_eq!(f.controller.request_radio().await.unwrap(), 2);
        let state = f.controller.state().await;
        assert!(state.radio_active);
        assert_eq!(state.song_queue.len(), 2);
        f.controller.shutdown();
    }
}
