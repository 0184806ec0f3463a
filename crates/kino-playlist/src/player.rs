//! Collaborator seams: the playback engine, the entry loader, and the
//! per-entry delegate.

use crate::{
    countdown::CountdownOptions, events::PlayerEvent, MediaEntry, MediaOptions, PluginConfig,
    Result,
};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// The playback engine the controller drives
pub trait Player: Send + Sync {
    /// Stop current playback
    fn stop(&self);

    /// Replace the current media and reconfigure plugins for it
    fn set_media_and_update_plugins(
        &self,
        entry: &MediaEntry,
        plugin_config: Option<&PluginConfig>,
    ) -> Result<()>;

    /// Subscribe to engine events
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;

    /// Duration of the current media in seconds (0 when unknown)
    fn duration(&self) -> f64;

    /// Playhead position in seconds
    fn current_time(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn rate(&self) -> f32;

    /// Whether plugins rewrite media entries before playback
    fn has_media_entry_interceptors(&self) -> bool {
        false
    }
}

/// Resolves an entry's playable sources
#[async_trait]
pub trait MediaEntryLoader: Send + Sync {
    async fn load_media(&self, options: &MediaOptions) -> Result<MediaEntry>;
}

/// Per-entry customization hooks
pub trait PlaylistDelegate: Send + Sync {
    /// Plugin config to apply with this entry
    fn plugin_config(&self, _entry: &MediaEntry, _index: usize) -> Option<PluginConfig> {
        None
    }

    /// Countdown override for this entry
    fn countdown_options(&self, _entry: &MediaEntry, _index: usize) -> Option<CountdownOptions> {
        None
    }
}

/// Delegate that keeps every default
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDelegate;

impl PlaylistDelegate for DefaultDelegate {}
