//! Kino Playlist CLI - Headless playlist simulator
//!
//! Features:
//! - Playlist simulation against a virtual player
//! - Playlist file validation
//! - Default configuration dump

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod simulator;

/// Kino Playlist CLI - drive a playlist without a real player
#[derive(Parser)]
#[command(name = "kino-playlist")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Playlist controller simulator and validator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a playlist file through a simulated player
    Simulate {
        /// Path to playlist JSON
        playlist: PathBuf,

        /// Path to playlist config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Loop back to the first entry at the end
        #[arg(long = "loop")]
        loop_enabled: bool,

        /// Stop after each entry instead of advancing
        #[arg(long)]
        no_auto_continue: bool,

        /// Entry ids whose load should fail (repeatable)
        #[arg(long)]
        fail: Vec<String>,

        /// Simulated load latency in milliseconds
        #[arg(long, default_value = "50")]
        latency_ms: u64,

        /// Duration in seconds for entries that carry none
        #[arg(long, default_value = "30")]
        entry_duration: f64,

        /// Playhead seconds advanced per tick
        #[arg(long, default_value = "1.0")]
        step: f64,

        /// Wall-clock milliseconds between ticks
        #[arg(long, default_value = "10")]
        interval_ms: u64,

        /// Give up after this many seconds (0 = never)
        #[arg(short, long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Check a playlist file for entries that cannot play
    Validate {
        /// Path to playlist JSON
        playlist: PathBuf,
    },

    /// Print the default playlist configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::Simulate {
            playlist,
            config,
            loop_enabled,
            no_auto_continue,
            fail,
            latency_ms,
            entry_duration,
            step,
            interval_ms,
            timeout_secs,
        } => {
            let options = commands::SimulateOptions {
                config,
                loop_enabled,
                auto_continue: !no_auto_continue,
                failing: fail,
                latency_ms,
                entry_duration,
                step,
                interval_ms,
                timeout_secs,
            };
            commands::simulate(&playlist, options, &cli.format).await?;
        }
        Commands::Validate { playlist } => {
            commands::validate(&playlist, &cli.format)?;
        }
        Commands::Config => {
            commands::config(&cli.format);
        }
    }

    Ok(())
}
