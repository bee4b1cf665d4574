//! midiplay - play a MIDI song from a background scheduler thread
//!
//! Run with: cargo run -- --bpm 100
//! Headless (logs events instead of drawing a TUI): cargo run -- --headless

mod app;
mod demo;
mod ui;

use clap::Parser;
use midiplay::PlayerConfig;

/// Terminal MIDI player with start/stop transport control.
#[derive(Parser, Debug)]
#[command(name = "midiplay", version, about)]
struct Cli {
    /// Song tempo in beats per minute.
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Playback speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    tempo_factor: f64,

    /// Number of bars in the demo song.
    #[arg(long, default_value_t = 4)]
    bars: u32,

    /// Keep sounding notes on stop instead of sending All Notes Off.
    #[arg(long)]
    no_panic: bool,

    /// Play once and log events instead of running the TUI.
    #[arg(long)]
    headless: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let song = demo::song(cli.bpm, cli.bars)?;
    let config = PlayerConfig {
        tempo_factor: cli.tempo_factor,
        all_notes_off_on_stop: !cli.no_panic,
        ..Default::default()
    };

    if cli.headless {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
        app::run_headless(&song, config)
    } else {
        app::run_tui(&song, config, cli.bpm)
    }
}
