//! Kino Playlist - Playlist Controller for Kino
//!
//! This crate sequences playback of a list of media entries on top of an
//! external playback engine:
//! - Next/previous/indexed navigation with loop and auto-continue
//! - Lazy loading and preloading of entry sources
//! - Countdown windows before the end of an entry
//! - Ad-aware end-of-entry handling
//! - Error recovery by skipping to a sibling entry
//! - Analytics event emission (optional)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Kino Playlist                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Entry     │  │   Playlist   │  │    Player    │           │
//! │  │    Loader    │  │   Delegate   │  │   (engine)   │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playlist   │◄── PlaylistHandle            │
//! │                    │  Service    │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │  Countdown   │  │   Message   │  │  Analytics   │            │
//! │  │   Preload    │  │     Bus     │──►   Emitter    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod events;
pub mod player;
pub mod countdown;
pub mod preload;
pub mod loader;
pub mod controller;
pub mod service;
#[cfg(feature = "analytics")]
pub mod analytics;

pub use error::{Error, Result};
pub use types::*;
pub use config::{PlaylistConfig, ProviderConfig};
pub use events::{MessageBus, PlayerEvent, PlaylistEvent};
pub use player::{DefaultDelegate, MediaEntryLoader, Player, PlaylistDelegate};
pub use countdown::{Countdown, CountdownEndReason, CountdownOptions};
pub use loader::StaticEntryLoader;
pub use controller::{LoadCompletion, PlaylistController};
pub use service::{PlaylistHandle, PlaylistService, PlaylistSnapshot};
#[cfg(feature = "analytics")]
pub use analytics::{AnalyticsEmitter, AnalyticsEventRecord, PlaylistStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playlist library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Playlist initialized");
}
