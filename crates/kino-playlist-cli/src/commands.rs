//! CLI command implementations

use crate::output::{format_event, format_output, OutputFormat};
use crate::simulator::SimulatedPlayer;
use kino_playlist::{
    AnalyticsEmitter, DefaultDelegate, MediaFormat, MessageBus, Player, Playlist,
    PlaylistConfig, PlaylistController, PlaylistEvent, PlaylistService, PlaylistSnapshot,
    PlaylistStats, StaticEntryLoader,
};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{info, warn};

/// Knobs for a simulation run
pub struct SimulateOptions {
    pub config: Option<PathBuf>,
    pub loop_enabled: bool,
    pub auto_continue: bool,
    pub failing: Vec<String>,
    pub latency_ms: u64,
    pub entry_duration: f64,
    pub step: f64,
    pub interval_ms: u64,
    pub timeout_secs: u64,
}

/// Why a simulation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ended,
    RecoveryExhausted,
    Idle,
    TimedOut,
    Closed,
}

/// Summary of a finished simulation
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub outcome: Outcome,
    pub snapshot: PlaylistSnapshot,
    pub stats: PlaylistStats,
    pub loads: usize,
}

fn read_playlist(path: &Path) -> anyhow::Result<Playlist> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Play a playlist file through the simulated player
pub async fn simulate(
    path: &Path,
    options: SimulateOptions,
    format: &str,
) -> anyhow::Result<SimulationReport> {
    let mut playlist = read_playlist(path)?;

    let mut config = match &options.config {
        Some(config_path) => PlaylistConfig::from_file(config_path)?,
        None => PlaylistConfig::default(),
    };
    if options.loop_enabled {
        config.loop_enabled = true;
    }
    if !options.auto_continue {
        config.auto_continue = false;
    }
    config.validate()?;

    // The file's sources become the loader catalog so entries load lazily
    let mut loader = StaticEntryLoader::from_entries(playlist.entries.iter().cloned())
        .with_latency(Duration::from_millis(options.latency_ms));
    for entry_id in &options.failing {
        loader = loader.with_failure(entry_id.clone());
    }
    let loader = Arc::new(loader);
    for entry in &mut playlist.entries {
        entry.sources.clear();
    }

    let output = OutputFormat::from(format);
    if output == OutputFormat::Text {
        println!("Simulating playlist: {}", path.display());
        println!("  Entries: {}", playlist.len());
        println!("  Loop: {}", config.loop_enabled);
        println!("  Auto-continue: {}", config.auto_continue);
        println!();
    }

    let bus = MessageBus::new();
    let mut events = bus.subscribe();
    let analytics = Arc::new(AnalyticsEmitter::new());
    let recorder = Arc::clone(&analytics).attach(&bus);

    let player = Arc::new(SimulatedPlayer::new(options.entry_duration));
    let controller = PlaylistController::new(
        playlist,
        config,
        player.clone(),
        loader.clone(),
        Arc::new(DefaultDelegate),
        bus,
    );
    let (handle, service) = PlaylistService::spawn(controller);
    let ticker = Arc::clone(&player).drive(
        options.step,
        Duration::from_millis(options.interval_ms.max(1)),
    );

    info!(session = %analytics.session_id(), "Simulation started");
    handle.play_next().await?;

    let deadline = (options.timeout_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(options.timeout_secs));
    let mut idle_check = tokio::time::interval(Duration::from_millis(options.interval_ms.max(1) * 10));
    let mut idle_ticks = 0;

    let outcome = loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", format_event(&event, format));
                    match event {
                        PlaylistEvent::Ended { .. } => break Outcome::Ended,
                        PlaylistEvent::RecoveryExhausted { .. } => break Outcome::RecoveryExhausted,
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event output fell behind"),
                Err(RecvError::Closed) => break Outcome::Closed,
            },
            _ = idle_check.tick() => {
                // Nothing loading and nothing playing twice in a row means no one will advance
                let snapshot = handle.snapshot().await?;
                if !snapshot.loading && !player.is_playing() {
                    idle_ticks += 1;
                    if idle_ticks >= 2 {
                        break Outcome::Idle;
                    }
                } else {
                    idle_ticks = 0;
                }
            }
            _ = wait_until(deadline) => break Outcome::TimedOut,
        }
    };

    ticker.abort();
    let snapshot = handle.snapshot().await?;
    drop(handle);
    if let Err(e) = service.await {
        warn!(error = %e, "Playlist service task failed");
    }
    let _ = recorder.await;
    analytics.flush().await;

    let report = SimulationReport {
        outcome,
        snapshot,
        stats: analytics.stats().await,
        loads: loader.load_count(),
    };

    match output {
        OutputFormat::Json => println!("{}", format_output(&report, format)),
        OutputFormat::Text => {
            println!();
            println!("Simulation finished: {:?}", report.outcome);
            println!(
                "  Last entry: {} (index {:?})",
                report.snapshot.current_entry_id.as_deref().unwrap_or("-"),
                report.snapshot.current_index
            );
            println!("  Entries started: {}", report.stats.entries_started);
            println!("  Load errors: {}", report.stats.load_errors);
            println!("  Loads issued: {}", report.loads);
            println!("  Countdowns shown: {}", report.stats.countdowns_shown);
            println!("  Error rate: {:.1}%", report.stats.error_rate() * 100.0);
        }
    }

    Ok(report)
}

/// Per-entry findings of a validation pass
#[derive(Debug, Serialize)]
pub struct EntryReport {
    pub index: usize,
    pub entry_id: String,
    pub sources: usize,
    pub formats: Vec<MediaFormat>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ValidationReport {
    playlist_id: String,
    entries: Vec<EntryReport>,
    playable: usize,
}

fn inspect(playlist: &Playlist) -> Vec<EntryReport> {
    let mut seen = HashSet::new();
    playlist
        .entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut warnings = Vec::new();
            if !seen.insert(entry.id.as_str()) {
                warnings.push("duplicate entry id".to_string());
            }
            if !entry.has_sources() && playlist.options_for(index).is_none() {
                warnings.push("no sources and no media options".to_string());
            }

            let formats: Vec<MediaFormat> = entry
                .sources
                .iter()
                .map(|source| match source.format {
                    MediaFormat::Unknown => MediaFormat::detect(&source.content_url),
                    known => known,
                })
                .collect();
            if formats.contains(&MediaFormat::Unknown) {
                warnings.push("source with unrecognized format".to_string());
            }

            EntryReport {
                index,
                entry_id: entry.id.clone(),
                sources: entry.sources.len(),
                formats,
                warnings,
            }
        })
        .collect()
}

/// Validate a playlist file
pub fn validate(path: &Path, format: &str) -> anyhow::Result<()> {
    let playlist = read_playlist(path)?;
    if playlist.is_empty() {
        anyhow::bail!("playlist {} has no entries", playlist.id);
    }
    if !playlist.media_options.is_empty() && playlist.media_options.len() != playlist.len() {
        warn!(
            options = playlist.media_options.len(),
            entries = playlist.len(),
            "media_options length does not match entries"
        );
    }

    let entries = inspect(&playlist);
    let playable = entries.iter().filter(|e| e.warnings.is_empty()).count();
    let report = ValidationReport {
        playlist_id: playlist.id.clone(),
        entries,
        playable,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", format_output(&report, format)),
        OutputFormat::Text => {
            println!("Validating playlist: {}", report.playlist_id);
            for entry in &report.entries {
                let status = if entry.warnings.is_empty() { "OK" } else { "WARN" };
                println!(
                    "  {}. {} - {} source(s) {:?} [{}]",
                    entry.index + 1,
                    entry.entry_id,
                    entry.sources,
                    entry.formats,
                    status
                );
                for warning in &entry.warnings {
                    println!("       {}", warning);
                }
            }
            println!("\n{}/{} entries playable", report.playable, report.entries.len());
        }
    }

    Ok(())
}

/// Print the default configuration
pub fn config(format: &str) {
    let config = PlaylistConfig::default();
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", format_output(&config, format)),
        OutputFormat::Text => println!("{}", config.to_json()),
    }
}
