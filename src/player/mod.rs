//! MidiPlayer - plays a `Song` when driven by a `PlaybackScheduler`
//!
//! The player walks the song's timeline one event group at a time. Each
//! timer callback emits the due group and arms the timer for the next one.
//! Delays are measured from a wall-clock anchor taken at start, so a late
//! callback shortens the following delay instead of pushing the rest of the
//! song back.

mod status;

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::{
    config::PlayerConfig,
    engine::{PlaybackContext, SequenceSource, StopReason},
    io::{MidiEvent, MidiOutput},
    sequencing::{EventGroup, Song},
};

pub use status::{PlayerState, PlayerStatus, StatusSink};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    #[error("tempo factor must be finite and positive, got {0}")]
    InvalidTempoFactor(f64),
}

/// Sequence source that emits a song's MIDI events on time
pub struct MidiPlayer<O: MidiOutput, S: StatusSink = ()> {
    /// Event groups in playback order
    timeline: Vec<EventGroup>,
    /// Song length in milliseconds
    duration_ms: f64,
    config: PlayerConfig,
    output: O,
    status: S,
    /// Index of the next group to emit
    next_group: usize,
    /// Song position in milliseconds
    position_ms: f64,
    /// Wall-clock instant and song position playback was anchored at
    anchor: Option<(Instant, f64)>,
    /// Notes currently sounding: (channel, key)
    sounding: Vec<(u8, u8)>,
    /// Bitmask of channels that received events this session
    used_channels: u16,
    /// Whether the last session played through to the end
    finished: bool,
    /// Events the output refused, over the player's lifetime
    dropped: u64,
}

impl<O: MidiOutput> MidiPlayer<O> {
    /// Create a player for `song` writing to `output`
    pub fn new(song: &Song, output: O) -> Self {
        Self {
            timeline: song.timeline(),
            duration_ms: song.duration_ms(),
            config: PlayerConfig::default(),
            output,
            status: (),
            next_group: 0,
            position_ms: 0.0,
            anchor: None,
            sounding: Vec::with_capacity(16),
            used_channels: 0,
            finished: false,
            dropped: 0,
        }
    }
}

impl<O: MidiOutput, S: StatusSink> MidiPlayer<O, S> {
    /// Replace the playback configuration
    pub fn with_config(mut self, config: PlayerConfig) -> Result<Self, PlayerError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Publish status snapshots to `status`
    pub fn with_status<T: StatusSink>(self, status: T) -> MidiPlayer<O, T> {
        MidiPlayer {
            timeline: self.timeline,
            duration_ms: self.duration_ms,
            config: self.config,
            output: self.output,
            status,
            next_group: self.next_group,
            position_ms: self.position_ms,
            anchor: self.anchor,
            sounding: self.sounding,
            used_channels: self.used_channels,
            finished: self.finished,
            dropped: self.dropped,
        }
    }

    /// Change playback speed; takes effect at the next start
    pub fn set_tempo_factor(&mut self, factor: f64) -> Result<(), PlayerError> {
        let config = PlayerConfig {
            tempo_factor: factor,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Move the playback position, clamped to the song
    pub fn seek(&mut self, position_ms: f64) {
        let position_ms = position_ms.clamp(0.0, self.duration_ms);
        self.position_ms = position_ms;
        self.next_group = self
            .timeline
            .partition_point(|group| group.time_ms < position_ms);
        self.finished = false;
        debug!(position_ms, next_group = self.next_group, "seek");
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn position_ms(&self) -> f64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Whether the last session played through to the end
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Events the output refused so far
    pub fn dropped_events(&self) -> u64 {
        self.dropped
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Arm the timer for the next group, or finish if there is none
    fn arm_next(&mut self, ctx: &mut PlaybackContext) {
        let Some(group_ms) = self.timeline.get(self.next_group).map(|g| g.time_ms) else {
            self.finished = true;
            ctx.finish();
            return;
        };
        let position_ms = self.position_ms;
        let (anchor_at, anchor_ms) = *self
            .anchor
            .get_or_insert_with(|| (Instant::now(), position_ms));

        // Extreme tempo factors or tempos can push the offset past what a
        // Duration holds; saturate so the timer simply never comes due
        let offset_ms = ((group_ms - anchor_ms) / self.config.tempo_factor).max(0.0);
        let offset = Duration::try_from_secs_f64(offset_ms / 1000.0).unwrap_or(Duration::MAX);
        let delay = match anchor_at.checked_add(offset) {
            Some(due) => due.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        };
        ctx.arm_timer(delay);
    }

    fn send(&mut self, event: MidiEvent) {
        if !self.output.send(event) {
            self.dropped += 1;
            trace!(?event, "output dropped event");
        }
    }

    /// Send an event and keep note/channel bookkeeping in sync
    fn emit(&mut self, event: MidiEvent) {
        let channel = event.channel();
        self.used_channels |= 1 << (channel & 0x0F);

        match event {
            MidiEvent::NoteOn { key, velocity, .. } if velocity > 0 => {
                if !self.sounding.contains(&(channel, key)) {
                    self.sounding.push((channel, key));
                }
            }
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key, .. } => {
                self.sounding.retain(|&note| note != (channel, key));
            }
            _ => {}
        }

        self.send(event);
    }

    /// Silence everything this session left sounding
    fn release_all(&mut self) {
        let sounding = std::mem::take(&mut self.sounding);
        for (channel, key) in sounding {
            self.send(MidiEvent::NoteOff {
                channel,
                key,
                velocity: 0,
            });
        }

        if self.config.all_notes_off_on_stop {
            for channel in 0..16u8 {
                if self.used_channels & (1 << channel) != 0 {
                    self.send(MidiEvent::all_notes_off(channel));
                }
            }
        }
        self.used_channels = 0;
    }

    fn publish(&mut self, state: PlayerState) {
        self.status.publish(PlayerStatus {
            state,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        });
    }
}

impl<O: MidiOutput, S: StatusSink> SequenceSource for MidiPlayer<O, S> {
    fn on_playback_starting(&mut self, ctx: &mut PlaybackContext) {
        if self.next_group >= self.timeline.len() && self.config.rewind_on_finish {
            self.seek(0.0);
        }
        self.finished = false;
        self.anchor = Some((Instant::now(), self.position_ms));
        debug!(
            position_ms = self.position_ms,
            groups = self.timeline.len() - self.next_group,
            "player starting"
        );

        self.publish(PlayerState::Playing);
        self.arm_next(ctx);
    }

    fn on_timer(&mut self, ctx: &mut PlaybackContext) {
        let index = self.next_group;
        let Some(time_ms) = self.timeline.get(index).map(|g| g.time_ms) else {
            self.finished = true;
            ctx.finish();
            return;
        };

        for i in 0..self.timeline[index].events.len() {
            let event = self.timeline[index].events[i];
            self.emit(event);
        }
        self.position_ms = time_ms;
        self.next_group += 1;

        self.publish(PlayerState::Playing);
        self.arm_next(ctx);
    }

    fn on_playback_stopped(&mut self, reason: StopReason) {
        if !self.finished {
            // Interrupted between groups: account for the time already played
            if let Some((anchor_at, anchor_ms)) = self.anchor {
                let elapsed_ms = anchor_at.elapsed().as_secs_f64() * 1000.0;
                let limit = self
                    .timeline
                    .get(self.next_group)
                    .map_or(self.duration_ms, |group| group.time_ms);
                let played = anchor_ms + elapsed_ms * self.config.tempo_factor;
                self.position_ms = played.min(limit).max(self.position_ms);
            }
        }
        self.anchor = None;
        self.release_all();

        let dropped = self.dropped;
        if dropped > 0 {
            warn!(dropped, "output dropped MIDI events");
        }

        if self.finished {
            self.publish(PlayerState::Finished);
            if self.config.rewind_on_finish {
                self.position_ms = 0.0;
                self.next_group = 0;
            }
        } else {
            self.publish(PlayerState::Stopped);
        }
        debug!(?reason, position_ms = self.position_ms, "player stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPQ: u32 = 480;

    /// Two quarter notes at 120 BPM: groups at 0, 500 and 1000 ms
    fn two_notes() -> Song {
        Song::builder(PPQ)
            .note(0, 0, 60, 100, PPQ)
            .note(PPQ, 0, 62, 100, PPQ)
            .build()
            .unwrap()
    }

    fn delay_ms(ctx: &PlaybackContext) -> f64 {
        ctx.armed_delay().unwrap().as_secs_f64() * 1000.0
    }

    #[test]
    fn test_plays_through_and_finishes() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        assert!(delay_ms(&ctx) <= 1.0);

        player.on_timer(&mut ctx);
        let delay = delay_ms(&ctx);
        assert!(delay <= 500.0 && delay > 400.0, "delay {delay}");

        player.on_timer(&mut ctx);
        player.on_timer(&mut ctx);
        assert!(ctx.is_finished());
        assert!(player.is_finished());

        player.on_playback_stopped(StopReason::Finished);
        assert_eq!(player.position_ms(), 0.0);

        let played = player.output();
        assert_eq!(
            played[0],
            MidiEvent::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100
            }
        );
        assert!(played[1].is_note_release());
        assert_eq!(played.len(), 5);
        assert_eq!(played[4], MidiEvent::all_notes_off(0));
    }

    #[test]
    fn test_stop_releases_sounding_notes() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);
        player.on_playback_stopped(StopReason::Requested);

        assert_eq!(
            *player.output(),
            vec![
                MidiEvent::NoteOn {
                    channel: 0,
                    key: 60,
                    velocity: 100
                },
                MidiEvent::NoteOff {
                    channel: 0,
                    key: 60,
                    velocity: 0
                },
                MidiEvent::all_notes_off(0),
            ]
        );
        assert!(!player.is_finished());
        assert!(player.position_ms() < 500.0);
    }

    #[test]
    fn test_all_notes_off_can_be_disabled() {
        let config = PlayerConfig {
            all_notes_off_on_stop: false,
            ..Default::default()
        };
        let mut player = MidiPlayer::new(&two_notes(), Vec::new())
            .with_config(config)
            .unwrap();
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);
        player.on_playback_stopped(StopReason::Requested);

        assert_eq!(player.output().len(), 2);
    }

    #[test]
    fn test_seek_skips_earlier_groups() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.seek(600.0);
        player.on_playback_starting(&mut ctx);

        let delay = delay_ms(&ctx);
        assert!(delay <= 400.0 && delay > 300.0, "delay {delay}");

        player.on_timer(&mut ctx);
        assert_eq!(player.output().len(), 1);
        assert!(player.output()[0].is_note_release());
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());

        player.seek(-50.0);
        assert_eq!(player.position_ms(), 0.0);

        player.seek(1e9);
        assert_eq!(player.position_ms(), player.duration_ms());
    }

    #[test]
    fn test_tempo_factor_scales_delays() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());
        player.set_tempo_factor(2.0).unwrap();
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);

        let delay = delay_ms(&ctx);
        assert!(delay <= 250.0 && delay > 150.0, "delay {delay}");
    }

    #[test]
    fn test_tiny_tempo_factor_saturates_delay() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());
        player.set_tempo_factor(1e-300).unwrap();
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);

        assert!(ctx.is_timer_armed());
        assert_eq!(ctx.armed_delay(), Some(Duration::MAX));

        player.on_playback_stopped(StopReason::Requested);
        assert_eq!(
            player.output()[1..],
            [
                MidiEvent::NoteOff {
                    channel: 0,
                    key: 60,
                    velocity: 0
                },
                MidiEvent::all_notes_off(0),
            ]
        );
    }

    #[test]
    fn test_tiny_bpm_saturates_delay() {
        let song = Song::builder(PPQ)
            .tempo(1e-300)
            .note(0, 0, 60, 100, PPQ)
            .build()
            .unwrap();
        let mut player = MidiPlayer::new(&song, Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);

        assert_eq!(ctx.armed_delay(), Some(Duration::MAX));
    }

    #[test]
    fn test_invalid_tempo_factor_rejected() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new());

        assert_eq!(
            player.set_tempo_factor(0.0),
            Err(PlayerError::InvalidTempoFactor(0.0))
        );
        assert_eq!(player.config().tempo_factor, 1.0);
    }

    #[test]
    fn test_start_at_end_without_rewind_finishes_immediately() {
        let config = PlayerConfig {
            rewind_on_finish: false,
            ..Default::default()
        };
        let mut player = MidiPlayer::new(&two_notes(), Vec::new())
            .with_config(config)
            .unwrap();
        let mut ctx = PlaybackContext::new(1);

        // Seeking to the end still leaves the final group due
        player.seek(player.duration_ms() + 1.0);
        player.on_timer(&mut PlaybackContext::new(1));
        assert!(player.is_finished());

        player.on_playback_starting(&mut ctx);

        assert!(ctx.is_finished());
        assert!(!ctx.is_timer_armed());
    }

    #[test]
    fn test_empty_song_finishes_on_start() {
        let song = Song::builder(PPQ).build().unwrap();
        let mut player = MidiPlayer::new(&song, Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);

        assert!(ctx.is_finished());
        player.on_playback_stopped(StopReason::Finished);
        assert!(player.output().is_empty());
    }

    #[test]
    fn test_status_published_per_step() {
        let mut player = MidiPlayer::new(&two_notes(), Vec::new()).with_status(Vec::new());
        let mut ctx = PlaybackContext::new(1);

        player.on_playback_starting(&mut ctx);
        player.on_timer(&mut ctx);
        player.on_timer(&mut ctx);
        player.on_playback_stopped(StopReason::Requested);

        let states: Vec<_> = player.status.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                PlayerState::Playing,
                PlayerState::Playing,
                PlayerState::Playing,
                PlayerState::Stopped
            ]
        );
        assert!((player.status[2].position_ms - 500.0).abs() < 1e-6);
    }
}
