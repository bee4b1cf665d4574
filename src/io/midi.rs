#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Controller number for "All Notes Off".
pub const ALL_NOTES_OFF: u8 = 123;

/// Center value of the 14-bit pitch bend range.
const PITCH_BEND_CENTER: i16 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Signed bend, -8192..=8191, 0 = centered
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// "All Notes Off" controller message for a channel
    pub fn all_notes_off(channel: u8) -> Self {
        MidiEvent::ControlChange {
            channel,
            controller: ALL_NOTES_OFF,
            value: 0,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }

    /// Whether this event releases a note (NoteOff, or NoteOn with velocity 0)
    pub fn is_note_release(&self) -> bool {
        matches!(
            self,
            MidiEvent::NoteOff { .. } | MidiEvent::NoteOn { velocity: 0, .. }
        )
    }

    /// Encode as a raw MIDI message.
    ///
    /// Returns the byte buffer and the number of bytes used. Channel is
    /// masked to 4 bits and data bytes to 7 bits, so out-of-range values
    /// never produce a stray status byte.
    pub fn to_bytes(&self) -> ([u8; 3], usize) {
        let status = |kind: u8, channel: u8| kind | (channel & 0x0F);
        match *self {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => ([status(0x90, channel), key & 0x7F, velocity & 0x7F], 3),
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => ([status(0x80, channel), key & 0x7F, velocity & 0x7F], 3),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => ([status(0xB0, channel), controller & 0x7F, value & 0x7F], 3),
            MidiEvent::PitchBend { channel, value } => {
                let raw = (value.clamp(-PITCH_BEND_CENTER, PITCH_BEND_CENTER - 1)
                    + PITCH_BEND_CENTER) as u16;
                (
                    [
                        status(0xE0, channel),
                        (raw & 0x7F) as u8,
                        ((raw >> 7) & 0x7F) as u8,
                    ],
                    3,
                )
            }
            MidiEvent::ProgramChange { channel, program } => {
                ([status(0xC0, channel), program & 0x7F, 0], 2)
            }
        }
    }
}
