//! Countdown window before the end of an entry
//!
//! A countdown opens when the remaining time of the current entry drops to
//! `time_to_show` and closes once `duration` seconds of playhead time have
//! passed, when the entry is left, or when it is canceled.

use serde::{Deserialize, Serialize};

/// Countdown configuration for one entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownOptions {
    /// Remaining seconds at which the countdown starts
    pub time_to_show: f64,
    /// Seconds the countdown stays open
    pub duration: f64,
    /// Whether the countdown is used at all
    pub should_display: bool,
}

impl Default for CountdownOptions {
    fn default() -> Self {
        Self {
            time_to_show: 10.0,
            duration: 10.0,
            should_display: true,
        }
    }
}

impl CountdownOptions {
    pub fn new(time_to_show: f64, duration: f64) -> Self {
        Self {
            time_to_show,
            duration,
            should_display: true,
        }
    }

    /// Options that never open a countdown
    pub fn disabled() -> Self {
        Self {
            should_display: false,
            ..Self::default()
        }
    }
}

/// Why a countdown closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownEndReason {
    /// The configured duration elapsed
    Elapsed,
    /// Playback moved to another entry
    Advanced,
    /// Disabled or seeked out of the window
    Canceled,
}

/// Event-worthy change of the countdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountdownTransition {
    Start { duration: f64 },
    End(CountdownEndReason),
}

/// Countdown state attached to the current entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    options: CountdownOptions,
    /// Playhead time at which the start event was sent
    sent_at: Option<f64>,
    ended: bool,
}

impl Countdown {
    pub fn new(options: CountdownOptions) -> Self {
        Self {
            options,
            sent_at: None,
            ended: false,
        }
    }

    pub fn options(&self) -> &CountdownOptions {
        &self.options
    }

    /// True once the start event went out
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    pub fn sent_at(&self) -> Option<f64> {
        self.sent_at
    }

    /// Started and not yet closed
    pub fn is_active(&self) -> bool {
        self.sent_at.is_some() && !self.ended
    }

    /// Feed a playhead update
    pub fn on_playhead(&mut self, current_time: f64, duration: f64) -> Option<CountdownTransition> {
        if !self.options.should_display || self.ended {
            return None;
        }
        if !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        match self.sent_at {
            None => {
                let remaining = duration - current_time;
                if remaining <= self.options.time_to_show {
                    self.sent_at = Some(current_time);
                    Some(CountdownTransition::Start {
                        duration: self.options.duration,
                    })
                } else {
                    None
                }
            }
            Some(sent_at) if current_time >= sent_at + self.options.duration => {
                self.ended = true;
                Some(CountdownTransition::End(CountdownEndReason::Elapsed))
            }
            Some(_) => None,
        }
    }

    /// Feed a seek. Seeking before the window re-arms the countdown,
    /// seeking inside it restarts the timer from the target.
    pub fn on_seek(&mut self, target: f64, duration: f64) -> Option<CountdownTransition> {
        if self.sent_at.is_none() {
            return None;
        }

        let before_window = duration - target > self.options.time_to_show;
        let was_active = self.is_active();

        if before_window {
            self.reset();
            return was_active.then_some(CountdownTransition::End(CountdownEndReason::Canceled));
        }

        if was_active {
            self.sent_at = Some(target);
        }
        None
    }

    /// Close an open countdown because the entry is being left
    pub fn finish(&mut self) -> Option<CountdownTransition> {
        self.close(CountdownEndReason::Advanced)
    }

    /// Close an open countdown without advancing
    pub fn cancel(&mut self) -> Option<CountdownTransition> {
        self.close(CountdownEndReason::Canceled)
    }

    /// Close an open countdown because the media ran out
    pub fn expire(&mut self) -> Option<CountdownTransition> {
        self.close(CountdownEndReason::Elapsed)
    }

    fn close(&mut self, reason: CountdownEndReason) -> Option<CountdownTransition> {
        if self.is_active() {
            self.ended = true;
            Some(CountdownTransition::End(reason))
        } else {
            None
        }
    }

    /// Forget the sent flag so the countdown can open again
    pub fn reset(&mut self) {
        self.sent_at = None;
        self.ended = false;
    }
}
