//! Player and playlist events
//!
//! `PlayerEvent` is what the playback engine reports to the controller.
//! `PlaylistEvent` is what the controller publishes on the [`MessageBus`]
//! for UI and analytics consumers.

use crate::countdown::CountdownEndReason;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Playback of the current entry reached its end
    Ended,
    /// A seek to `target` seconds began
    Seeking { target: f64 },
    /// Periodic playhead report
    PlayheadUpdate { current_time: f64 },
    /// Ad cue points known; tells whether a post-roll will play
    AdCuePointsUpdate { has_post_roll: bool },
    /// An ad was loaded
    AdLoaded { is_post_roll: bool },
    /// An ad started playing
    AdStarted,
    /// An ad finished playing
    AdCompleted,
    /// Every scheduled ad has played
    AllAdsCompleted,
    /// The engine failed to play the current entry
    Error { code: String, message: String },
}

/// Events published by the playlist controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaylistEvent {
    /// Playlist handed to the controller
    Loaded { playlist_id: String, count: usize },
    /// First entry of a session requested
    Started { playlist_id: String },
    /// End of the playlist reached without loop
    Ended { playlist_id: String },
    /// Current entry changed
    CurrentItemChanged { index: usize, entry_id: String },
    /// Entry could not be loaded or played
    LoadMediaError {
        entry_id: String,
        code: String,
        message: String,
    },
    /// Countdown window opened
    CountdownStart { entry_id: String, duration: f64 },
    /// Countdown window closed
    CountdownEnd {
        entry_id: String,
        reason: CountdownEndReason,
    },
    /// Loop flag changed
    LoopStateChanged { enabled: bool },
    /// Auto-continue flag changed
    AutoContinueStateChanged { enabled: bool },
    /// Too many consecutive failures, recovery stopped
    RecoveryExhausted { attempts: usize },
}

impl PlaylistEvent {
    /// Build a load error event from an error
    pub fn load_error(entry_id: impl Into<String>, error: &Error) -> Self {
        PlaylistEvent::LoadMediaError {
            entry_id: entry_id.into(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }

    /// Snake case name of the event
    pub fn name(&self) -> &'static str {
        match self {
            PlaylistEvent::Loaded { .. } => "loaded",
            PlaylistEvent::Started { .. } => "started",
            PlaylistEvent::Ended { .. } => "ended",
            PlaylistEvent::CurrentItemChanged { .. } => "current_item_changed",
            PlaylistEvent::LoadMediaError { .. } => "load_media_error",
            PlaylistEvent::CountdownStart { .. } => "countdown_start",
            PlaylistEvent::CountdownEnd { .. } => "countdown_end",
            PlaylistEvent::LoopStateChanged { .. } => "loop_state_changed",
            PlaylistEvent::AutoContinueStateChanged { .. } => "auto_continue_state_changed",
            PlaylistEvent::RecoveryExhausted { .. } => "recovery_exhausted",
        }
    }
}

/// Broadcast bus for playlist events
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<PlaylistEvent>,
}

impl MessageBus {
    /// Default number of events a slow subscriber may lag behind
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to every event posted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlaylistEvent> {
        self.tx.subscribe()
    }

    /// Post an event; dropped when nobody listens
    pub fn post(&self, event: PlaylistEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            trace!(event = name, "No subscribers for playlist event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
