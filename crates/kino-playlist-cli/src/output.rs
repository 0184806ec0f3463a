//! Output formatting for CLI

use chrono::Local;
use kino_playlist::PlaylistEvent;
use serde::Serialize;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}

/// Format output based on selected format
pub fn format_output<T: Serialize>(data: &T, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => {
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            format!("{:?}", serde_json::to_value(data).unwrap_or_default())
        }
    }
}

/// One line per playlist event
pub fn format_event(event: &PlaylistEvent, format: &str) -> String {
    if OutputFormat::from(format) == OutputFormat::Json {
        return serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    }

    let stamp = Local::now().format("%H:%M:%S");
    let detail = match event {
        PlaylistEvent::Loaded { playlist_id, count } => {
            format!("playlist {} loaded with {} entries", playlist_id, count)
        }
        PlaylistEvent::Started { playlist_id } => format!("playlist {} started", playlist_id),
        PlaylistEvent::Ended { playlist_id } => format!("playlist {} ended", playlist_id),
        PlaylistEvent::CurrentItemChanged { index, entry_id } => {
            format!("now playing #{} ({})", index, entry_id)
        }
        PlaylistEvent::LoadMediaError { entry_id, code, message } => {
            format!("load failed for {}: {} {}", entry_id, code, message)
        }
        PlaylistEvent::CountdownStart { entry_id, duration } => {
            format!("countdown on {} for {:.1}s", entry_id, duration)
        }
        PlaylistEvent::CountdownEnd { entry_id, reason } => {
            format!("countdown on {} ended ({:?})", entry_id, reason)
        }
        PlaylistEvent::LoopStateChanged { enabled } => format!("loop {}", on_off(*enabled)),
        PlaylistEvent::AutoContinueStateChanged { enabled } => {
            format!("auto-continue {}", on_off(*enabled))
        }
        PlaylistEvent::RecoveryExhausted { attempts } => {
            format!("gave up recovering after {} attempts", attempts)
        }
    };

    format!("[{}] {:<22} {}", stamp, event.name(), detail)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
