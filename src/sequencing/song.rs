#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::io::midi::MidiEvent;

/// Tempo used when the builder is given none
pub const DEFAULT_BPM: f64 = 120.0;

/// A MIDI event placed on the tick grid
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SongEvent {
    /// Position in ticks from song start
    pub tick: u32,
    pub event: MidiEvent,
}

/// Tempo in effect from `tick` until the next change
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TempoChange {
    pub tick: u32,
    pub bpm: f64,
}

/// Events that share one tick, with their time in milliseconds
#[derive(Debug, Clone, PartialEq)]
pub struct EventGroup {
    pub tick: u32,
    pub time_ms: f64,
    pub events: Vec<MidiEvent>,
}

/// A playable song: timestamped MIDI events plus a tempo map.
///
/// Only `SongBuilder::build` produces one, so the orderings below always hold.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "SongData", into = "SongData"))]
pub struct Song {
    /// Pulses per quarter note (timing resolution), never zero
    ppq: u32,
    /// Events ordered by tick; releases come first within a tick
    events: Vec<SongEvent>,
    /// Tempo changes ordered by unique tick, first one at tick 0
    tempo_changes: Vec<TempoChange>,
}

impl Song {
    /// Create a new song builder
    pub fn builder(ppq: u32) -> SongBuilder {
        SongBuilder::new(ppq)
    }

    pub fn ppq(&self) -> u32 {
        self.ppq
    }

    pub fn events(&self) -> &[SongEvent] {
        &self.events
    }

    pub fn tempo_changes(&self) -> &[TempoChange] {
        &self.tempo_changes
    }

    /// Tick of the last event (0 for an empty song)
    pub fn total_ticks(&self) -> u32 {
        self.events.last().map_or(0, |e| e.tick)
    }

    /// Convert a tick position to milliseconds using the tempo map
    pub fn tick_to_ms(&self, tick: u32) -> f64 {
        let mut ms = 0.0;
        let mut prev_tick = 0;
        let mut bpm = self.tempo_changes.first().map_or(DEFAULT_BPM, |t| t.bpm);

        for change in self.tempo_changes.iter().skip(1) {
            if change.tick >= tick {
                break;
            }
            ms += (change.tick - prev_tick) as f64 * self.ms_per_tick(bpm);
            prev_tick = change.tick;
            bpm = change.bpm;
        }

        ms + (tick - prev_tick) as f64 * self.ms_per_tick(bpm)
    }

    /// Length of the song in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.tick_to_ms(self.total_ticks())
    }

    /// Group events by tick and resolve their times.
    ///
    /// Group times are strictly increasing.
    pub fn timeline(&self) -> Vec<EventGroup> {
        let mut groups: Vec<EventGroup> = Vec::new();

        // Walk events and tempo changes together instead of re-scanning the
        // tempo map for every tick
        let mut tempo_idx = 0;
        let mut segment_tick = 0;
        let mut segment_ms = 0.0;
        let mut bpm = self.tempo_changes.first().map_or(DEFAULT_BPM, |t| t.bpm);

        for song_event in &self.events {
            if let Some(group) = groups.last_mut() {
                if group.tick == song_event.tick {
                    group.events.push(song_event.event);
                    continue;
                }
            }

            while let Some(change) = self.tempo_changes.get(tempo_idx + 1) {
                if change.tick >= song_event.tick {
                    break;
                }
                segment_ms += (change.tick - segment_tick) as f64 * self.ms_per_tick(bpm);
                segment_tick = change.tick;
                bpm = change.bpm;
                tempo_idx += 1;
            }

            groups.push(EventGroup {
                tick: song_event.tick,
                time_ms: segment_ms
                    + (song_event.tick - segment_tick) as f64 * self.ms_per_tick(bpm),
                events: vec![song_event.event],
            });
        }

        groups
    }

    /// Compute milliseconds per tick from tempo
    fn ms_per_tick(&self, bpm: f64) -> f64 {
        // ticks per minute = bpm * ppq
        60_000.0 / (bpm * self.ppq as f64)
    }
}

/// Builder for constructing songs with a fluent API
pub struct SongBuilder {
    ppq: u32,
    bpm: f64,
    tempo_changes: Vec<TempoChange>,
    events: Vec<SongEvent>,
}

impl SongBuilder {
    fn new(ppq: u32) -> Self {
        Self {
            ppq,
            bpm: DEFAULT_BPM,
            tempo_changes: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Set the initial tempo (default: 120 BPM)
    pub fn tempo(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    /// Change tempo from `tick` onwards
    pub fn tempo_change(mut self, tick: u32, bpm: f64) -> Self {
        self.tempo_changes.push(TempoChange { tick, bpm });
        self
    }

    /// Place a single event
    pub fn event(mut self, tick: u32, event: MidiEvent) -> Self {
        self.events.push(SongEvent { tick, event });
        self
    }

    /// Place a note: NoteOn at `tick`, NoteOff `duration_ticks` later
    pub fn note(self, tick: u32, channel: u8, key: u8, velocity: u8, duration_ticks: u32) -> Self {
        self.event(
            tick,
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            },
        )
        .event(
            tick.saturating_add(duration_ticks),
            MidiEvent::NoteOff {
                channel,
                key,
                velocity: 64,
            },
        )
    }

    /// Validate and build the song
    pub fn build(self) -> Result<Song, SongError> {
        if self.ppq == 0 {
            return Err(SongError::ZeroPpq);
        }

        let mut tempo_changes = vec![TempoChange {
            tick: 0,
            bpm: self.bpm,
        }];
        tempo_changes.extend(self.tempo_changes);
        for change in &tempo_changes {
            if !change.bpm.is_finite() || change.bpm <= 0.0 {
                return Err(SongError::InvalidTempo {
                    tick: change.tick,
                    bpm: change.bpm,
                });
            }
        }
        // Later entries for the same tick win; stable sort keeps their order
        tempo_changes.sort_by_key(|t| t.tick);
        tempo_changes.reverse();
        tempo_changes.dedup_by_key(|t| t.tick);
        tempo_changes.reverse();

        for song_event in &self.events {
            validate_event(song_event)?;
        }

        let mut events = self.events;
        events.sort_by_key(|e| (e.tick, !e.event.is_note_release()));

        Ok(Song {
            ppq: self.ppq,
            events,
            tempo_changes,
        })
    }
}

/// Unvalidated serialized form of a `Song`
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct SongData {
    ppq: u32,
    events: Vec<SongEvent>,
    #[serde(default)]
    tempo_changes: Vec<TempoChange>,
}

#[cfg(feature = "serde")]
impl TryFrom<SongData> for Song {
    type Error = SongError;

    fn try_from(data: SongData) -> Result<Self, Self::Error> {
        // A stored tick-0 change overrides the builder's default tempo
        let mut builder = Song::builder(data.ppq);
        for change in data.tempo_changes {
            builder = builder.tempo_change(change.tick, change.bpm);
        }
        for song_event in data.events {
            builder = builder.event(song_event.tick, song_event.event);
        }
        builder.build()
    }
}

#[cfg(feature = "serde")]
impl From<Song> for SongData {
    fn from(song: Song) -> Self {
        Self {
            ppq: song.ppq,
            events: song.events,
            tempo_changes: song.tempo_changes,
        }
    }
}

fn validate_event(song_event: &SongEvent) -> Result<(), SongError> {
    let tick = song_event.tick;
    let channel = song_event.event.channel();
    if channel > 15 {
        return Err(SongError::InvalidChannel { tick, channel });
    }

    let data = match song_event.event {
        MidiEvent::NoteOn { key, velocity, .. } | MidiEvent::NoteOff { key, velocity, .. } => {
            [key, velocity]
        }
        MidiEvent::ControlChange {
            controller, value, ..
        } => [controller, value],
        MidiEvent::ProgramChange { program, .. } => [program, 0],
        MidiEvent::PitchBend { value, .. } => {
            if !(-8192..=8191).contains(&value) {
                return Err(SongError::PitchBendOutOfRange { tick, value });
            }
            [0, 0]
        }
    };

    match data.iter().find(|&&byte| byte > 127) {
        Some(&value) => Err(SongError::DataOutOfRange { tick, value }),
        None => Ok(()),
    }
}

/// Errors that can occur when building a song
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SongError {
    #[error("ppq must be greater than zero")]
    ZeroPpq,
    #[error("invalid tempo {bpm} BPM at tick {tick}")]
    InvalidTempo { tick: u32, bpm: f64 },
    #[error("MIDI channel {channel} out of range at tick {tick}")]
    InvalidChannel { tick: u32, channel: u8 },
    #[error("MIDI data byte {value} out of range at tick {tick}")]
    DataOutOfRange { tick: u32, value: u8 },
    #[error("pitch bend {value} out of range at tick {tick}")]
    PitchBendOutOfRange { tick: u32, value: i16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPQ: u32 = 480;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    fn note_on(key: u8) -> MidiEvent {
        MidiEvent::NoteOn {
            channel: 0,
            key,
            velocity: 100,
        }
    }

    #[test]
    fn test_quarter_note_at_120_bpm_is_500ms() {
        let song = Song::builder(PPQ).note(0, 0, 60, 100, PPQ).build().unwrap();

        assert_close(song.tick_to_ms(PPQ), 500.0);
        assert_close(song.duration_ms(), 500.0);
    }

    #[test]
    fn test_tempo_change_splits_conversion() {
        let song = Song::builder(PPQ)
            .tempo(120.0)
            .tempo_change(PPQ, 60.0)
            .build()
            .unwrap();

        // One beat at 120 BPM, then one beat at 60 BPM
        assert_close(song.tick_to_ms(PPQ), 500.0);
        assert_close(song.tick_to_ms(2 * PPQ), 1500.0);
    }

    #[test]
    fn test_tempo_change_at_zero_overrides_initial() {
        let song = Song::builder(PPQ)
            .tempo(120.0)
            .tempo_change(0, 240.0)
            .build()
            .unwrap();

        assert_eq!(song.tempo_changes().len(), 1);
        assert_close(song.tick_to_ms(PPQ), 250.0);
    }

    #[test]
    fn test_timeline_groups_by_tick() {
        let song = Song::builder(PPQ)
            .event(0, note_on(60))
            .event(0, note_on(64))
            .event(PPQ, note_on(67))
            .build()
            .unwrap();

        let timeline = song.timeline();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].events.len(), 2);
        assert_close(timeline[1].time_ms, 500.0);
    }

    #[test]
    fn test_timeline_matches_tick_to_ms_across_tempo_changes() {
        let song = Song::builder(PPQ)
            .tempo(90.0)
            .tempo_change(PPQ / 2, 150.0)
            .tempo_change(3 * PPQ, 75.0)
            .note(0, 0, 60, 100, PPQ)
            .note(2 * PPQ, 0, 62, 100, PPQ)
            .note(4 * PPQ, 0, 64, 100, PPQ)
            .build()
            .unwrap();

        for group in song.timeline() {
            assert_close(group.time_ms, song.tick_to_ms(group.tick));
        }
    }

    #[test]
    fn test_release_sorted_before_retrigger() {
        let song = Song::builder(PPQ)
            .note(0, 0, 60, 100, PPQ)
            .note(PPQ, 0, 60, 100, PPQ)
            .build()
            .unwrap();

        let timeline = song.timeline();
        assert!(timeline[1].events[0].is_note_release());
        assert!(!timeline[1].events[1].is_note_release());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert_eq!(Song::builder(0).build().unwrap_err(), SongError::ZeroPpq);

        let result = Song::builder(PPQ).tempo(0.0).build();
        assert!(matches!(result, Err(SongError::InvalidTempo { .. })));

        let result = Song::builder(PPQ).note(0, 16, 60, 100, 10).build();
        assert!(matches!(result, Err(SongError::InvalidChannel { channel: 16, .. })));

        let result = Song::builder(PPQ).note(0, 0, 128, 100, 10).build();
        assert!(matches!(result, Err(SongError::DataOutOfRange { value: 128, .. })));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_sorts_tempo_map() {
        let json = r#"{
            "ppq": 480,
            "events": [],
            "tempo_changes": [
                {"tick": 0, "bpm": 120.0},
                {"tick": 600, "bpm": 60.0},
                {"tick": 100, "bpm": 90.0}
            ]
        }"#;
        let song: Song = serde_json::from_str(json).unwrap();

        let ticks: Vec<u32> = song.tempo_changes().iter().map(|t| t.tick).collect();
        assert_eq!(ticks, vec![0, 100, 600]);
        assert!(song.tick_to_ms(960).is_finite());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_rejects_invalid_song() {
        let zero_ppq = r#"{"ppq": 0, "events": []}"#;
        assert!(serde_json::from_str::<Song>(zero_ppq).is_err());

        let bad_tempo = r#"{"ppq": 480, "events": [], "tempo_changes": [{"tick": 10, "bpm": -1.0}]}"#;
        assert!(serde_json::from_str::<Song>(bad_tempo).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialized_song_reloads() {
        let song = Song::builder(PPQ)
            .tempo(90.0)
            .note(0, 0, 60, 100, PPQ)
            .build()
            .unwrap();

        let json = serde_json::to_string(&song).unwrap();
        let reloaded: Song = serde_json::from_str(&json).unwrap();

        assert_eq!(reloaded.events(), song.events());
        assert_eq!(reloaded.tempo_changes(), song.tempo_changes());
    }

    #[test]
    fn test_empty_song() {
        let song = Song::builder(PPQ).build().unwrap();

        assert_eq!(song.total_ticks(), 0);
        assert_eq!(song.duration_ms(), 0.0);
        assert!(song.timeline().is_empty());
    }
}
