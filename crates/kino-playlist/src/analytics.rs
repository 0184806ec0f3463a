//! Analytics event emission
//!
//! Turns playlist events from the message bus into timestamped records for:
//! - Usage analytics (entries started, playlists completed)
//! - Error tracking (load failures, exhausted recovery)
//! - Engagement (countdowns shown and how they ended)

use crate::{
    countdown::CountdownEndReason,
    events::{MessageBus, PlaylistEvent},
    types::SessionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Analytics event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEventRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Session ID
    pub session_id: SessionId,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Sequence number
    pub sequence: u64,
    /// The event
    #[serde(flatten)]
    pub event: PlaylistEvent,
}

/// Running totals over everything recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaylistStats {
    pub entries_started: u32,
    pub load_errors: u32,
    pub countdowns_shown: u32,
    pub countdowns_canceled: u32,
    pub playlists_completed: u32,
    pub recoveries_exhausted: u32,
}

impl PlaylistStats {
    fn record(&mut self, event: &PlaylistEvent) {
        match event {
            PlaylistEvent::CurrentItemChanged { .. } => self.entries_started += 1,
            PlaylistEvent::LoadMediaError { .. } => self.load_errors += 1,
            PlaylistEvent::CountdownStart { .. } => self.countdowns_shown += 1,
            PlaylistEvent::CountdownEnd {
                reason: CountdownEndReason::Canceled,
                ..
            } => self.countdowns_canceled += 1,
            PlaylistEvent::Ended { .. } => self.playlists_completed += 1,
            PlaylistEvent::RecoveryExhausted { .. } => self.recoveries_exhausted += 1,
            _ => {}
        }
    }

    /// Share of started entries that failed to load (0-1)
    pub fn error_rate(&self) -> f64 {
        if self.entries_started == 0 {
            return 0.0;
        }
        self.load_errors as f64 / self.entries_started as f64
    }
}

/// Analytics emitter
pub struct AnalyticsEmitter {
    /// Session ID
    session_id: SessionId,
    /// Event sequence counter
    sequence: RwLock<u64>,
    /// Event buffer
    buffer: RwLock<Vec<AnalyticsEventRecord>>,
    /// Totals
    stats: RwLock<PlaylistStats>,
    /// Maximum buffer size before flush
    max_buffer_size: usize,
    /// Beacon endpoint (if configured)
    beacon_url: Option<String>,
}

impl AnalyticsEmitter {
    /// Create a new analytics emitter
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            sequence: RwLock::new(0),
            buffer: RwLock::new(Vec::new()),
            stats: RwLock::new(PlaylistStats::default()),
            max_buffer_size: 50,
            beacon_url: None,
        }
    }

    /// Create with beacon endpoint
    pub fn with_beacon(beacon_url: String) -> Self {
        let mut emitter = Self::new();
        emitter.beacon_url = Some(beacon_url);
        emitter
    }

    /// Set how many records are buffered before a flush
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size.max(1);
        self
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Record every event posted on `bus` until it closes
    pub fn attach(self: Arc<Self>, bus: &MessageBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.record(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Analytics fell behind the playlist bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Record one playlist event
    pub async fn record(&self, event: PlaylistEvent) {
        let mut seq = self.sequence.write().await;
        *seq += 1;
        let sequence = *seq;
        drop(seq);

        self.stats.write().await.record(&event);

        let record = AnalyticsEventRecord {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            timestamp: Utc::now(),
            sequence,
            event,
        };

        debug!(
            event_id = %record.id,
            sequence,
            event = record.event.name(),
            "Analytics event"
        );

        // Add to buffer
        let mut buffer = self.buffer.write().await;
        buffer.push(record);

        // Flush if buffer is full
        if buffer.len() >= self.max_buffer_size {
            let events: Vec<_> = buffer.drain(..).collect();
            drop(buffer);
            self.flush_events(events).await;
        }
    }

    /// Flush buffered events
    async fn flush_events(&self, events: Vec<AnalyticsEventRecord>) {
        if events.is_empty() {
            return;
        }

        info!(count = events.len(), "Flushing analytics events");

        if let Some(url) = self.beacon_url.clone() {
            // Sent off the recording path so a slow endpoint never stalls the bus
            tokio::spawn(async move {
                let client = reqwest::Client::new();
                if let Err(e) = client.post(&url).json(&events).send().await {
                    warn!(error = %e, "Analytics beacon failed");
                }
            });
        }
    }

    /// Flush whatever is buffered now
    pub async fn flush(&self) {
        let events: Vec<_> = self.buffer.write().await.drain(..).collect();
        self.flush_events(events).await;
    }

    /// Get all buffered events
    pub async fn get_events(&self) -> Vec<AnalyticsEventRecord> {
        self.buffer.read().await.clone()
    }

    /// Totals since creation
    pub async fn stats(&self) -> PlaylistStats {
        self.stats.read().await.clone()
    }

    /// Clear buffer
    pub async fn clear(&self) {
        self.buffer.write().await.clear();
    }
}

impl Default for AnalyticsEmitter {
    fn default() -> Self {
        Self::new()
    }
}
