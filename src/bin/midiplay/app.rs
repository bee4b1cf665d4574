//! Wiring between the player, its scheduler and the front ends

use std::{thread, time::Duration};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::info;

use midiplay::{MidiEvent, MidiPlayer, PlaybackScheduler, PlayerConfig, PlayerStatus, Song};

use super::ui::{UiApp, UiState};

/// Ring buffer capacity for MIDI events headed to the UI
const EVENT_QUEUE: usize = 1024;
/// Ring buffer capacity for status snapshots
const STATUS_QUEUE: usize = 64;

pub type Player = MidiPlayer<Producer<MidiEvent>, Producer<PlayerStatus>>;

/// Scheduler plus the receiving ends of its player's queues
pub struct Playback {
    pub scheduler: PlaybackScheduler<Player>,
    pub events: Consumer<MidiEvent>,
    pub status: Consumer<PlayerStatus>,
}

impl Playback {
    pub fn new(song: &Song, config: PlayerConfig) -> EyreResult<Self> {
        let (event_tx, event_rx) = RingBuffer::new(EVENT_QUEUE);
        let (status_tx, status_rx) = RingBuffer::new(STATUS_QUEUE);

        let player = MidiPlayer::new(song, event_tx)
            .with_config(config)
            .wrap_err("invalid player configuration")?
            .with_status(status_tx);

        Ok(Self {
            scheduler: PlaybackScheduler::new(player),
            events: event_rx,
            status: status_rx,
        })
    }
}

/// Play the song once, logging every event.
///
/// Nothing reads status snapshots here, so the player publishes none.
pub fn run_headless(song: &Song, config: PlayerConfig) -> EyreResult<()> {
    let (event_tx, mut event_rx) = RingBuffer::new(EVENT_QUEUE);
    let player = MidiPlayer::new(song, event_tx)
        .with_config(config)
        .wrap_err("invalid player configuration")?;
    let mut scheduler = PlaybackScheduler::new(player);
    info!(
        events = song.events().len(),
        duration_ms = song.duration_ms(),
        "playing demo song"
    );

    scheduler.start()?;
    loop {
        let running = scheduler.is_running();
        while let Ok(event) = event_rx.pop() {
            let (bytes, len) = event.to_bytes();
            info!(?event, bytes = ?&bytes[..len], "midi");
        }
        if !running {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    scheduler.wait()?;

    let player = scheduler
        .source()
        .ok_or_else(|| eyre!("player was not returned by the scheduler"))?;
    info!(dropped = player.dropped_events(), "playback finished");
    Ok(())
}

/// Run the interactive terminal UI
pub fn run_tui(song: &Song, config: PlayerConfig, bpm: f64) -> EyreResult<()> {
    let initial = UiState::new(bpm, config.tempo_factor, song.duration_ms());
    let playback = Playback::new(song, config)?;

    let mut terminal = ratatui::init();
    let result = UiApp::new(playback, initial).run(&mut terminal);
    ratatui::restore();
    result
}
