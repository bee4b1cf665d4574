#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::player::PlayerError;

/// Playback behavior of a `MidiPlayer`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlayerConfig {
    /// Speed multiplier: 2.0 plays twice as fast
    pub tempo_factor: f64,
    /// Send "All Notes Off" on every used channel when playback stops
    pub all_notes_off_on_stop: bool,
    /// Jump back to the start after the last event played
    pub rewind_on_finish: bool,
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<(), PlayerError> {
        if !self.tempo_factor.is_finite() || self.tempo_factor <= 0.0 {
            return Err(PlayerError::InvalidTempoFactor(self.tempo_factor));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tempo_factor: 1.0,
            all_notes_off_on_stop: true,
            rewind_on_finish: true,
        }
    }
}
