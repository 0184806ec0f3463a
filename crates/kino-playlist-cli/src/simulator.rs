//! Simulated playback engine
//!
//! Stands in for a real player: accepts media, advances a virtual playhead
//! on every tick, and reports playhead/end events like an engine would.

use kino_playlist::{MediaEntry, Player, PlayerEvent, PluginConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct SimState {
    entry_id: Option<String>,
    duration: f64,
    position: f64,
    playing: bool,
}

/// Player that plays nothing but keeps time
pub struct SimulatedPlayer {
    events: broadcast::Sender<PlayerEvent>,
    state: Mutex<SimState>,
    /// Duration used for entries that carry none
    default_duration: f64,
}

impl SimulatedPlayer {
    pub fn new(default_duration: f64) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            events,
            state: Mutex::new(SimState::default()),
            default_duration,
        }
    }

    /// Advance the playhead by `step` seconds and report it
    pub fn tick(&self, step: f64) {
        let emitted = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            if !state.playing {
                return;
            }

            state.position = (state.position + step).min(state.duration);
            let mut emitted = vec![PlayerEvent::PlayheadUpdate {
                current_time: state.position,
            }];
            if state.position >= state.duration {
                state.playing = false;
                debug!(entry_id = ?state.entry_id, "Simulated entry ended");
                emitted.push(PlayerEvent::Ended);
            }
            emitted
        };

        for event in emitted {
            let _ = self.events.send(event);
        }
    }

    /// Tick forever at `interval` until the task is aborted
    pub fn drive(self: Arc<Self>, step: f64, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.tick(step);
            }
        })
    }
}

impl Player for SimulatedPlayer {
    fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.playing = false;
        }
    }

    fn set_media_and_update_plugins(
        &self,
        entry: &MediaEntry,
        plugin_config: Option<&PluginConfig>,
    ) -> kino_playlist::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| kino_playlist::Error::Playback {
                entry_id: entry.id.clone(),
                message: "simulator state poisoned".to_string(),
            })?;

        state.entry_id = Some(entry.id.clone());
        state.duration = entry.duration.unwrap_or(self.default_duration);
        state.position = 0.0;
        state.playing = true;

        debug!(
            entry_id = %entry.id,
            duration = state.duration,
            plugins = plugin_config.map_or(0, |c| c.plugins.len()),
            "Simulated media set"
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    fn duration(&self) -> f64 {
        self.state.lock().map(|s| s.duration).unwrap_or(0.0)
    }

    fn current_time(&self) -> f64 {
        self.state.lock().map(|s| s.position).unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.state.lock().map(|s| s.playing).unwrap_or(false)
    }

    fn rate(&self) -> f32 {
        if self.is_playing() {
            1.0
        } else {
            0.0
        }
    }
}
