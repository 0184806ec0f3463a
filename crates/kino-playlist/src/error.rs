//! Error types for Kino Playlist

use thiserror::Error;

/// Result type alias for playlist operations
pub type Result<T> = std::result::Result<T, Error>;

/// Playlist error types
#[derive(Error, Debug)]
pub enum Error {
    // Navigation errors
    #[error("Index {index} out of range for playlist of {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Playlist has no entries")]
    EmptyPlaylist,

    // Entry errors
    #[error("Failed to load media entry {entry_id}: {message}")]
    EntryLoad { entry_id: String, message: String },

    #[error("Media entry {entry_id} has no playable sources")]
    NoSources { entry_id: String },

    // Playback errors
    #[error("Playback error on {entry_id}: {message}")]
    Playback { entry_id: String, message: String },

    #[error("Gave up recovering after {attempts} consecutive failures")]
    RecoveryExhausted { attempts: usize },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Service errors
    #[error("Playlist service is no longer running")]
    ServiceClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "analytics")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Error {
    /// Create an entry load error
    pub fn entry_load(entry_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::EntryLoad {
            entry_id: entry_id.into(),
            message: message.into(),
        }
    }

    /// Returns true if skipping to a sibling entry may help
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EntryLoad { .. } | Error::NoSources { .. } | Error::Playback { .. }
        )
    }

    /// Returns the error code for events and analytics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Error::EmptyPlaylist => "EMPTY_PLAYLIST",
            Error::EntryLoad { .. } => "ENTRY_LOAD",
            Error::NoSources { .. } => "NO_SOURCES",
            Error::Playback { .. } => "PLAYBACK",
            Error::RecoveryExhausted { .. } => "RECOVERY_EXHAUSTED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ServiceClosed => "SERVICE_CLOSED",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
            #[cfg(feature = "analytics")]
            Error::Network(_) => "NETWORK",
        }
    }
}
