//! UI-side view of playback
//!
//! Only the UI thread touches this; the playback thread reaches it through
//! ring buffers.

use std::collections::VecDeque;

use midiplay::{MidiEvent, PlayerState, PlayerStatus};

/// How many recent events the UI keeps
pub const RECENT_EVENTS: usize = 64;

pub struct UiState {
    /// Song tempo in BPM
    pub bpm: f64,
    /// Playback speed multiplier
    pub tempo_factor: f64,
    /// Latest status received from the player
    pub status: PlayerStatus,
    /// Most recent events, newest last
    pub recent: VecDeque<MidiEvent>,
    /// Events received since launch
    pub events_seen: u64,
}

impl UiState {
    pub fn new(bpm: f64, tempo_factor: f64, duration_ms: f64) -> Self {
        Self {
            bpm,
            tempo_factor,
            status: PlayerStatus {
                state: PlayerState::Stopped,
                position_ms: 0.0,
                duration_ms,
            },
            recent: VecDeque::with_capacity(RECENT_EVENTS),
            events_seen: 0,
        }
    }

    pub fn push_event(&mut self, event: MidiEvent) {
        if self.recent.len() == RECENT_EVENTS {
            self.recent.pop_front();
        }
        self.recent.push_back(event);
        self.events_seen += 1;
    }
}
