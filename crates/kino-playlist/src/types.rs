//! Core types for Kino Playlist

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playlist session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container/streaming format of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Hls,
    Dash,
    Mp4,
    Wvm,
    #[default]
    Unknown,
}

impl MediaFormat {
    /// Detect format from the URL path extension
    pub fn detect(url: &Url) -> Self {
        let path = url.path().to_lowercase();
        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            MediaFormat::Hls
        } else if path.ends_with(".mpd") {
            MediaFormat::Dash
        } else if path.ends_with(".mp4") || path.ends_with(".m4v") {
            MediaFormat::Mp4
        } else if path.ends_with(".wvm") {
            MediaFormat::Wvm
        } else {
            MediaFormat::Unknown
        }
    }

    /// Get MIME type for format
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Hls => "application/x-mpegURL",
            MediaFormat::Dash => "application/dash+xml",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Wvm => "video/wvm",
            MediaFormat::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaFormat::Hls => write!(f, "hls"),
            MediaFormat::Dash => write!(f, "dash"),
            MediaFormat::Mp4 => write!(f, "mp4"),
            MediaFormat::Wvm => write!(f, "wvm"),
            MediaFormat::Unknown => write!(f, "unknown"),
        }
    }
}

/// DRM scheme a source is protected with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmScheme {
    Widevine,
    FairPlay,
    PlayReady,
}

/// A playable source of a media entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Source identifier
    pub id: String,
    /// URL the player fetches
    pub content_url: Url,
    /// Streaming format
    #[serde(default)]
    pub format: MediaFormat,
    /// DRM schemes protecting this source
    #[serde(default)]
    pub drm: Vec<DrmScheme>,
}

impl MediaSource {
    /// Create a source, detecting the format from the URL
    pub fn new(id: impl Into<String>, content_url: Url) -> Self {
        let format = MediaFormat::detect(&content_url);
        Self {
            id: id.into(),
            content_url,
            format,
            drm: Vec::new(),
        }
    }

    /// Add a DRM scheme
    pub fn with_drm(mut self, scheme: DrmScheme) -> Self {
        self.drm.push(scheme);
        self
    }
}

/// VOD or live content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Vod,
    Live,
    #[default]
    Unknown,
}

/// A playable unit in a playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Entry identifier (OVP entry id or OTT asset id)
    pub id: String,
    /// Playable sources, empty until loaded
    #[serde(default)]
    pub sources: Vec<MediaSource>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Duration in seconds, if known
    #[serde(default)]
    pub duration: Option<f64>,
    /// VOD or live
    #[serde(default)]
    pub media_type: MediaType,
    /// Free-form descriptive metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl MediaEntry {
    /// Create an entry with no sources
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sources: Vec::new(),
            name: None,
            duration: None,
            media_type: MediaType::Unknown,
            metadata: HashMap::new(),
        }
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a source
    pub fn with_source(mut self, source: MediaSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Set duration in seconds
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Whether the entry can be handed to the player as is
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Provider-specific parameters for resolving an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderVariant {
    /// Online video platform
    Ovp {
        #[serde(default)]
        ks: Option<String>,
        #[serde(default)]
        referrer: Option<String>,
        #[serde(default)]
        redirect_from_entry_id: bool,
    },
    /// OTT backend
    Ott {
        #[serde(default = "default_asset_type")]
        asset_type: String,
        #[serde(default = "default_playback_context_type")]
        playback_context_type: String,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        file_ids: Vec<String>,
        #[serde(default)]
        network_protocol: Option<String>,
        #[serde(default)]
        ks: Option<String>,
    },
}

fn default_asset_type() -> String {
    "media".to_string()
}

fn default_playback_context_type() -> String {
    "playback".to_string()
}

impl Default for ProviderVariant {
    fn default() -> Self {
        ProviderVariant::Ovp {
            ks: None,
            referrer: None,
            redirect_from_entry_id: true,
        }
    }
}

/// What an entry loader needs to resolve one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaOptions {
    pub entry_id: String,
    #[serde(flatten)]
    pub variant: ProviderVariant,
}

impl MediaOptions {
    pub fn new(entry_id: impl Into<String>, variant: ProviderVariant) -> Self {
        Self {
            entry_id: entry_id.into(),
            variant,
        }
    }
}

/// Per-entry plugin configuration keyed by plugin name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub plugins: HashMap<String, serde_json::Value>,
}

impl PluginConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace config for a plugin
    pub fn with_plugin(mut self, name: impl Into<String>, config: serde_json::Value) -> Self {
        self.plugins.insert(name.into(), config);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// An ordered list of media entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Entries in play order
    pub entries: Vec<MediaEntry>,
    /// Explicit load options per entry, same length as `entries` when set
    #[serde(default)]
    pub media_options: Vec<Option<MediaOptions>>,
}

impl Playlist {
    /// Create a playlist from entries
    pub fn new(id: impl Into<String>, entries: Vec<MediaEntry>) -> Self {
        Self {
            id: id.into(),
            name: None,
            entries,
            media_options: Vec::new(),
        }
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set explicit load options for one entry
    pub fn with_media_options(mut self, index: usize, options: MediaOptions) -> Self {
        if self.media_options.len() < self.entries.len() {
            self.media_options.resize(self.entries.len(), None);
        }
        if let Some(slot) = self.media_options.get_mut(index) {
            *slot = Some(options);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(index)
    }

    /// Explicit load options for an entry, if any
    pub fn options_for(&self, index: usize) -> Option<&MediaOptions> {
        self.media_options.get(index).and_then(|o| o.as_ref())
    }
}

/// Last navigation direction, used to pick the recovery direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}
