//! Playlist Controller - sequences media entries on top of a player
//!
//! Coordinates:
//! - Navigation (next/previous/index, loop and auto-continue)
//! - Lazy source loading and preloading of the upcoming entry
//! - Countdown windows before the end of an entry
//! - Ad gating of end-of-entry handling
//! - Error recovery by skipping in the last navigation direction
//!
//! The controller is a single-owner state machine. Loads run on spawned
//! tasks and report back through a completion channel; their results are
//! only applied by whoever owns the controller, via [`apply_completion`].
//!
//! [`apply_completion`]: PlaylistController::apply_completion

use crate::{
    config::PlaylistConfig,
    countdown::{Countdown, CountdownEndReason, CountdownTransition},
    events::{MessageBus, PlayerEvent, PlaylistEvent},
    player::{MediaEntryLoader, Player, PlaylistDelegate},
    preload::PreloadTracker,
    Direction, Error, MediaEntry, Playlist, Result,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Why a load was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    /// Sources needed to start playback of a play request
    Play { request: u64 },
    /// Sources fetched ahead of time
    Preload,
}

/// A play request waiting for sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingPlay {
    index: usize,
    request: u64,
    /// Waiting on an in-flight preload instead of its own load
    joined_preload: bool,
}

/// Result of a finished entry load, to be fed back with
/// [`PlaylistController::apply_completion`]
#[derive(Debug)]
pub struct LoadCompletion {
    epoch: u64,
    kind: LoadKind,
    index: usize,
    entry_id: String,
    result: Result<MediaEntry>,
}

impl LoadCompletion {
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn is_preload(&self) -> bool {
        self.kind == LoadKind::Preload
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Playlist controller managing sequencing for one playlist
pub struct PlaylistController {
    /// Configuration the flags reset to
    config: PlaylistConfig,
    /// Playlist as handed in, restored on reset
    original: Playlist,
    /// Working copy whose entries gain sources as they load
    playlist: Playlist,
    player: Arc<dyn Player>,
    loader: Arc<dyn MediaEntryLoader>,
    delegate: Arc<dyn PlaylistDelegate>,
    bus: MessageBus,

    current_index: Option<usize>,
    loop_enabled: bool,
    auto_continue: bool,
    recover_on_error: bool,
    direction: Direction,
    preloading: PreloadTracker,
    countdown: Option<Countdown>,

    /// Play request waiting for sources
    loading: Option<PendingPlay>,
    /// Preload already triggered for the current entry
    preload_requested: bool,
    post_roll_pending: bool,
    ad_playing: bool,
    /// Entry ended while a post-roll was pending
    awaiting_ads: bool,
    /// `Ended` already published for the current position
    playlist_ended: bool,
    /// Countdown elapse moved on before the previous media reported its end
    end_of_left_media_pending: bool,
    consecutive_failures: usize,

    /// Bumped on reset so older completions are discarded
    epoch: u64,
    request_seq: u64,
    in_flight: usize,
    completion_tx: mpsc::UnboundedSender<LoadCompletion>,
    completion_rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl PlaylistController {
    /// Create a controller and publish `Loaded`
    pub fn new(
        playlist: Playlist,
        config: PlaylistConfig,
        player: Arc<dyn Player>,
        loader: Arc<dyn MediaEntryLoader>,
        delegate: Arc<dyn PlaylistDelegate>,
        bus: MessageBus,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        info!(
            playlist_id = %playlist.id,
            entries = playlist.len(),
            loop_enabled = config.loop_enabled,
            auto_continue = config.auto_continue,
            "Playlist loaded"
        );
        bus.post(PlaylistEvent::Loaded {
            playlist_id: playlist.id.clone(),
            count: playlist.len(),
        });

        Self {
            loop_enabled: config.loop_enabled,
            auto_continue: config.auto_continue,
            recover_on_error: config.recover_on_error,
            config,
            original: playlist.clone(),
            playlist,
            player,
            loader,
            delegate,
            bus,
            current_index: None,
            direction: Direction::Forward,
            preloading: PreloadTracker::new(),
            countdown: None,
            loading: None,
            preload_requested: false,
            post_roll_pending: false,
            ad_playing: false,
            awaiting_ads: false,
            playlist_ended: false,
            end_of_left_media_pending: false,
            consecutive_failures: 0,
            epoch: 0,
            request_seq: 0,
            in_flight: 0,
            completion_tx,
            completion_rx,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn config(&self) -> &PlaylistConfig {
        &self.config
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn player(&self) -> &Arc<dyn Player> {
        &self.player
    }

    pub fn len(&self) -> usize {
        self.playlist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist.is_empty()
    }

    /// Current index, `None` before the first play and after reset
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_entry(&self) -> Option<&MediaEntry> {
        self.current_index.and_then(|i| self.playlist.get(i))
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn is_auto_continue(&self) -> bool {
        self.auto_continue
    }

    pub fn is_recover_on_error(&self) -> bool {
        self.recover_on_error
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Waiting for sources of the current entry
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn preloading_ids(&self) -> Vec<String> {
        self.preloading.ids()
    }

    /// Loads spawned whose completion has not been applied yet
    pub fn has_pending_loads(&self) -> bool {
        self.in_flight > 0
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn set_loop(&mut self, enabled: bool) {
        if self.loop_enabled != enabled {
            self.loop_enabled = enabled;
            info!(enabled, "Loop state changed");
            self.bus.post(PlaylistEvent::LoopStateChanged { enabled });
        }
    }

    pub fn set_auto_continue(&mut self, enabled: bool) {
        if self.auto_continue != enabled {
            self.auto_continue = enabled;
            info!(enabled, "Auto-continue state changed");
            self.bus.post(PlaylistEvent::AutoContinueStateChanged { enabled });
        }
    }

    pub fn set_recover_on_error(&mut self, enabled: bool) {
        self.recover_on_error = enabled;
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn is_next_item_available(&self) -> bool {
        if self.playlist.is_empty() {
            return false;
        }
        if self.loop_enabled {
            return true;
        }
        self.current_index.map_or(0, |i| i + 1) < self.playlist.len()
    }

    pub fn is_previous_item_available(&self) -> bool {
        if self.playlist.is_empty() {
            return false;
        }
        if self.loop_enabled {
            return true;
        }
        matches!(self.current_index, Some(i) if i > 0)
    }

    /// Advance by one, restarting with loop or publishing `Ended` without
    pub fn play_next(&mut self) -> Result<()> {
        self.direction = Direction::Forward;

        let len = self.playlist.len();
        if len == 0 {
            warn!("play_next on an empty playlist");
            return Err(Error::EmptyPlaylist);
        }

        let next = self.current_index.map_or(0, |i| i + 1);
        if next < len {
            self.play_item(next)
        } else if self.loop_enabled {
            info!("End of playlist reached, looping to first entry");
            self.play_item(0)
        } else {
            self.finish_playlist();
            Ok(())
        }
    }

    /// Go back by one, wrapping with loop
    pub fn play_prev(&mut self) -> Result<()> {
        self.direction = Direction::Backward;

        let len = self.playlist.len();
        if len == 0 {
            warn!("play_prev on an empty playlist");
            return Err(Error::EmptyPlaylist);
        }

        match self.current_index {
            Some(i) if i > 0 => self.play_item(i - 1),
            _ if self.loop_enabled => {
                info!("Start of playlist reached, looping to last entry");
                self.play_item(len - 1)
            }
            current => {
                warn!(?current, "No previous entry to play");
                Ok(())
            }
        }
    }

    /// Play the entry at `index`, loading its sources first if needed
    pub fn play_item(&mut self, index: usize) -> Result<()> {
        let len = self.playlist.len();
        if index >= len {
            warn!(index, len, "Requested entry index out of range");
            return Err(Error::IndexOutOfRange { index, len });
        }

        let was_idle = self.current_index.is_none();

        self.player.stop();
        self.leave_current_item();

        self.current_index = Some(index);
        self.request_seq += 1;
        self.playlist_ended = false;

        let entry = &self.playlist.entries[index];
        let entry_id = entry.id.clone();
        let has_sources = entry.has_sources();

        info!(index, entry_id = %entry_id, has_sources, "Playing entry");

        if was_idle {
            self.bus.post(PlaylistEvent::Started {
                playlist_id: self.playlist.id.clone(),
            });
        }
        self.bus.post(PlaylistEvent::CurrentItemChanged {
            index,
            entry_id: entry_id.clone(),
        });

        if has_sources {
            self.loading = None;
            self.apply_media(index);
        } else if self.preloading.contains(&entry_id) {
            debug!(entry_id = %entry_id, "Waiting for in-flight preload");
            self.loading = Some(PendingPlay {
                index,
                request: self.request_seq,
                joined_preload: true,
            });
        } else {
            self.loading = Some(PendingPlay {
                index,
                request: self.request_seq,
                joined_preload: false,
            });
            self.spawn_load(index, LoadKind::Play { request: self.request_seq });
        }

        Ok(())
    }

    /// Start playing from the first entry again
    pub fn replay(&mut self) -> Result<()> {
        self.current_index = None;
        self.play_next()
    }

    /// Restore the pristine playlist and configured flags
    pub fn reset(&mut self) {
        info!(playlist_id = %self.original.id, "Resetting playlist");

        self.current_index = None;
        self.loop_enabled = self.config.loop_enabled;
        self.auto_continue = self.config.auto_continue;
        self.recover_on_error = self.config.recover_on_error;
        self.direction = Direction::Forward;
        self.preloading.clear();
        self.playlist = self.original.clone();
        self.countdown = None;
        self.loading = None;
        self.preload_requested = false;
        self.post_roll_pending = false;
        self.ad_playing = false;
        self.awaiting_ads = false;
        self.playlist_ended = false;
        self.end_of_left_media_pending = false;
        self.consecutive_failures = 0;
        self.epoch += 1;
    }

    /// Close and drop the countdown of the current entry
    pub fn disable_countdown_for_current_item(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            debug!("Countdown disabled for current entry");
            let transition = countdown.cancel();
            self.publish_countdown(transition);
        }
    }

    /// Fetch sources of the upcoming entry ahead of time.
    /// Returns true if a load was started.
    pub fn preload_next(&mut self) -> bool {
        if self.player.has_media_entry_interceptors() {
            debug!("Media entry interceptors present, preloading disabled");
            return false;
        }

        let Some(next) = self.next_index() else {
            return false;
        };

        let entry = &self.playlist.entries[next];
        if entry.has_sources() {
            debug!(entry_id = %entry.id, "Next entry already has sources");
            return false;
        }
        if !self.preloading.try_begin(&entry.id) {
            debug!(entry_id = %entry.id, "Next entry already preloading");
            return false;
        }

        debug!(index = next, entry_id = %entry.id, "Preloading next entry");
        self.spawn_load(next, LoadKind::Preload);
        true
    }

    /// Skip to a sibling entry in the last navigation direction.
    /// Fails with `RecoveryExhausted` once the consecutive failure cap is hit.
    pub fn recover_playback(&mut self) -> Result<()> {
        let limit = self.config.recovery_limit(self.playlist.len());
        self.consecutive_failures += 1;

        if self.consecutive_failures > limit {
            let attempts = self.consecutive_failures - 1;
            self.consecutive_failures = 0;
            self.bus.post(PlaylistEvent::RecoveryExhausted { attempts });
            return Err(Error::RecoveryExhausted { attempts });
        }

        info!(
            direction = %self.direction,
            failures = self.consecutive_failures,
            "Recovering playback"
        );
        match self.direction {
            Direction::Forward => self.play_next(),
            Direction::Backward => self.play_prev(),
        }
    }

    // ------------------------------------------------------------------
    // Load completions
    // ------------------------------------------------------------------

    /// Wait for the next finished load
    pub async fn next_completion(&mut self) -> Option<LoadCompletion> {
        self.completion_rx.recv().await
    }

    /// Apply every outstanding load, including loads started while applying
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.completion_rx.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
    }

    /// Apply a finished load to the controller state
    pub fn apply_completion(&mut self, completion: LoadCompletion) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let LoadCompletion {
            epoch,
            kind,
            index,
            entry_id,
            result,
        } = completion;

        if epoch != self.epoch {
            debug!(entry_id = %entry_id, "Discarding load issued before reset");
            return;
        }

        match kind {
            LoadKind::Preload => {
                self.preloading.finish(&entry_id);
                let waiting =
                    matches!(self.loading, Some(p) if p.index == index && p.joined_preload);

                match result {
                    Ok(loaded) => {
                        debug!(entry_id = %entry_id, sources = loaded.sources.len(), "Preload finished");
                        self.store_sources(index, loaded);
                        if waiting {
                            self.loading = None;
                            self.apply_media(index);
                        }
                    }
                    Err(e) => {
                        warn!(entry_id = %entry_id, error = %e, "Preload failed");
                        if waiting {
                            self.loading = None;
                            self.handle_failure(&entry_id, &e);
                        }
                    }
                }
            }
            LoadKind::Play { request } => {
                let is_current = matches!(self.loading, Some(p) if p.request == request);

                match result {
                    Ok(loaded) => {
                        self.store_sources(index, loaded);
                        if is_current {
                            self.loading = None;
                            self.apply_media(index);
                        } else {
                            debug!(entry_id = %entry_id, "Loaded entry is no longer current");
                        }
                    }
                    Err(e) => {
                        if is_current {
                            self.loading = None;
                            self.handle_failure(&entry_id, &e);
                        } else {
                            debug!(entry_id = %entry_id, error = %e, "Stale load failed");
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Player events
    // ------------------------------------------------------------------

    /// React to an event from the playback engine
    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Ended => self.on_ended(),
            PlayerEvent::Seeking { target } => self.on_seeking(target),
            PlayerEvent::PlayheadUpdate { current_time } => self.on_playhead(current_time),
            PlayerEvent::AdCuePointsUpdate { has_post_roll } => {
                self.post_roll_pending = has_post_roll;
            }
            PlayerEvent::AdLoaded { is_post_roll } => {
                if is_post_roll {
                    self.post_roll_pending = true;
                }
            }
            PlayerEvent::AdStarted => self.ad_playing = true,
            PlayerEvent::AdCompleted => self.ad_playing = false,
            PlayerEvent::AllAdsCompleted => {
                self.ad_playing = false;
                self.post_roll_pending = false;
                if self.awaiting_ads {
                    self.awaiting_ads = false;
                    debug!("Ads completed, continuing after entry end");
                    self.advance_after_end();
                }
            }
            PlayerEvent::Error { code, message } => self.on_player_error(&code, &message),
        }
    }

    fn on_ended(&mut self) {
        if self.current_index.is_none() || self.loading.is_some() {
            return;
        }
        if self.end_of_left_media_pending {
            self.end_of_left_media_pending = false;
            debug!("Ignoring end of media already advanced past");
            return;
        }

        if self.post_roll_pending {
            debug!("Entry ended, waiting for post-roll ads");
            self.awaiting_ads = true;
            return;
        }

        self.advance_after_end();
    }

    fn advance_after_end(&mut self) {
        if self.auto_continue {
            if let Err(e) = self.play_next() {
                warn!(error = %e, "Auto-continue failed");
            }
        } else if !self.loop_enabled
            && self.current_index == Some(self.playlist.len().saturating_sub(1))
        {
            self.finish_playlist();
        }

        // Still open when nothing moved on: the media simply ran out
        if let Some(countdown) = self.countdown.as_mut() {
            let transition = countdown.expire();
            self.publish_countdown(transition);
        }
    }

    fn on_seeking(&mut self, target: f64) {
        if self.current_index.is_none() || self.loading.is_some() {
            return;
        }
        let duration = self.player.duration();
        if let Some(countdown) = self.countdown.as_mut() {
            let transition = countdown.on_seek(target, duration);
            self.publish_countdown(transition);
        }
    }

    fn on_playhead(&mut self, current_time: f64) {
        if self.current_index.is_none() || self.loading.is_some() || self.ad_playing {
            return;
        }

        let duration = self.player.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return;
        }
        if current_time > 0.0 {
            self.consecutive_failures = 0;
        }
        self.end_of_left_media_pending = false;

        let remaining = duration - current_time;
        if !self.preload_requested && remaining <= self.preload_threshold() {
            self.preload_requested = true;
            self.preload_next();
        }

        let transition = self
            .countdown
            .as_mut()
            .and_then(|c| c.on_playhead(current_time, duration));
        let elapsed = transition == Some(CountdownTransition::End(CountdownEndReason::Elapsed));
        self.publish_countdown(transition);

        if elapsed && self.auto_continue {
            if let Err(e) = self.play_next() {
                warn!(error = %e, "Advancing after countdown failed");
            }
            // The engine may still report the end of the media just left
            self.end_of_left_media_pending = true;
        }
    }

    fn on_player_error(&mut self, code: &str, message: &str) {
        let Some(entry_id) = self.current_entry().map(|e| e.id.clone()) else {
            warn!(code, message, "Player error with no current entry");
            return;
        };

        let err = Error::Playback {
            entry_id: entry_id.clone(),
            message: format!("{}: {}", code, message),
        };
        self.handle_failure(&entry_id, &err);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_index(&self) -> Option<usize> {
        let len = self.playlist.len();
        if len == 0 {
            return None;
        }
        let next = self.current_index.map_or(0, |i| i + 1);
        if next < len {
            Some(next)
        } else if self.loop_enabled {
            Some(0)
        } else {
            None
        }
    }

    /// Remaining time at which to preload
    fn preload_threshold(&self) -> f64 {
        match self.countdown.as_ref().map(|c| c.options()) {
            Some(options) if options.should_display => self.config.preload_time.max(options.time_to_show),
            _ => self.config.preload_time,
        }
    }

    /// Drop per-entry state before switching entries
    fn leave_current_item(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            let transition = countdown.finish();
            self.publish_countdown(transition);
        }
        self.preload_requested = false;
        self.post_roll_pending = false;
        self.ad_playing = false;
        self.awaiting_ads = false;
    }

    fn finish_playlist(&mut self) {
        if self.playlist_ended {
            debug!("Playlist already ended");
            return;
        }
        self.playlist_ended = true;
        info!(playlist_id = %self.playlist.id, "Playlist ended");
        self.bus.post(PlaylistEvent::Ended {
            playlist_id: self.playlist.id.clone(),
        });
    }

    /// Hand the entry to the player with its plugin config and countdown
    fn apply_media(&mut self, index: usize) {
        let entry = &self.playlist.entries[index];
        let plugin_config = self.delegate.plugin_config(entry, index);
        let countdown_options = self
            .delegate
            .countdown_options(entry, index)
            .unwrap_or(self.config.countdown);

        match self
            .player
            .set_media_and_update_plugins(entry, plugin_config.as_ref())
        {
            Ok(()) => {
                debug!(
                    index,
                    entry_id = %entry.id,
                    plugins = plugin_config.as_ref().map_or(0, |c| c.plugins.len()),
                    "Media handed to player"
                );
                self.countdown = Some(Countdown::new(countdown_options));
            }
            Err(e) => {
                let entry_id = entry.id.clone();
                self.handle_failure(&entry_id, &e);
            }
        }
    }

    fn handle_failure(&mut self, entry_id: &str, error: &Error) {
        warn!(entry_id, error = %error, "Entry failed");
        self.bus.post(PlaylistEvent::load_error(entry_id, error));

        if self.recover_on_error && error.is_recoverable() {
            if let Err(e) = self.recover_playback() {
                warn!(error = %e, "Error recovery stopped");
            }
        }
    }

    /// Copy loaded sources (and any missing metadata) onto the entry
    fn store_sources(&mut self, index: usize, loaded: MediaEntry) {
        let Some(entry) = self.playlist.entries.get_mut(index) else {
            return;
        };

        entry.sources = loaded.sources;
        if entry.name.is_none() {
            entry.name = loaded.name;
        }
        if entry.duration.is_none() {
            entry.duration = loaded.duration;
        }
        if entry.media_type == crate::MediaType::Unknown {
            entry.media_type = loaded.media_type;
        }
        for (key, value) in loaded.metadata {
            entry.metadata.entry(key).or_insert(value);
        }
    }

    fn spawn_load(&mut self, index: usize, kind: LoadKind) {
        let entry_id = self.playlist.entries[index].id.clone();
        let options = self
            .playlist
            .options_for(index)
            .cloned()
            .unwrap_or_else(|| self.config.provider.options_for(&entry_id));

        let loader = Arc::clone(&self.loader);
        let tx = self.completion_tx.clone();
        let epoch = self.epoch;
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = loader.load_media(&options).await;
            let _ = tx.send(LoadCompletion {
                epoch,
                kind,
                index,
                entry_id,
                result,
            });
        });
    }

    fn publish_countdown(&self, transition: Option<CountdownTransition>) {
        let Some(transition) = transition else {
            return;
        };
        let entry_id = self
            .current_entry()
            .map(|e| e.id.clone())
            .unwrap_or_default();

        match transition {
            CountdownTransition::Start { duration } => {
                info!(entry_id = %entry_id, duration, "Countdown started");
                self.bus.post(PlaylistEvent::CountdownStart { entry_id, duration });
            }
            CountdownTransition::End(reason) => {
                info!(entry_id = %entry_id, ?reason, "Countdown ended");
                self.bus.post(PlaylistEvent::CountdownEnd { entry_id, reason });
            }
        }
    }
}
