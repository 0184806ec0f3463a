//! Playlist configuration
//!
//! Configuration objects are built explicitly and handed to the controller;
//! nothing here is global.

use crate::{countdown::CountdownOptions, Error, MediaOptions, ProviderVariant, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Backend the entry loader talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider server base URL
    pub server_url: Option<Url>,
    /// Partner/account id
    pub partner_id: Option<i64>,
    /// Variant used when an entry has no explicit media options
    pub variant: ProviderVariant,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            partner_id: None,
            variant: ProviderVariant::default(),
        }
    }
}

impl ProviderConfig {
    /// Default load options for an entry id
    pub fn options_for(&self, entry_id: &str) -> MediaOptions {
        MediaOptions::new(entry_id, self.variant.clone())
    }
}

/// Playlist controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Wrap around at both ends
    pub loop_enabled: bool,
    /// Advance automatically when an entry ends
    pub auto_continue: bool,
    /// Skip to a sibling entry when loading or playback fails
    pub recover_on_error: bool,
    /// Seconds before the end of an entry at which the next one is preloaded
    pub preload_time: f64,
    /// Countdown used when the delegate provides none
    pub countdown: CountdownOptions,
    /// Consecutive recoveries before giving up (None = one lap over the playlist)
    pub max_consecutive_recoveries: Option<usize>,
    /// Entry loader backend
    pub provider: ProviderConfig,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            loop_enabled: false,
            auto_continue: true,
            recover_on_error: true,
            preload_time: 10.0,
            countdown: CountdownOptions::default(),
            max_consecutive_recoveries: None,
            provider: ProviderConfig::default(),
        }
    }
}

impl PlaylistConfig {
    /// Parse from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.preload_time.is_finite() || self.preload_time < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "preload_time must be a non-negative number, got {}",
                self.preload_time
            )));
        }
        if !self.countdown.time_to_show.is_finite() || self.countdown.time_to_show < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "countdown.time_to_show must be a non-negative number, got {}",
                self.countdown.time_to_show
            )));
        }
        if !self.countdown.duration.is_finite() || self.countdown.duration < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "countdown.duration must be a non-negative number, got {}",
                self.countdown.duration
            )));
        }
        if self.max_consecutive_recoveries == Some(0) && self.recover_on_error {
            return Err(Error::InvalidConfig(
                "max_consecutive_recoveries of 0 with recover_on_error; disable recovery instead"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Recovery cap for a playlist of `len` entries
    pub fn recovery_limit(&self, len: usize) -> usize {
        self.max_consecutive_recoveries.unwrap_or(len.max(1))
    }
}
