//! Built-in demo song

use midiplay::{MidiEvent, Song, SongError};

const PPQ: u32 = 480;

/// Arpeggio over a bass line, one chord per bar
pub fn song(bpm: f64, bars: u32) -> Result<Song, SongError> {
    // C - Am - F - G
    let chords: [[u8; 3]; 4] = [[60, 64, 67], [57, 60, 64], [53, 57, 60], [55, 59, 62]];
    let eighth = PPQ / 2;

    let mut builder = Song::builder(PPQ)
        .tempo(bpm)
        .event(0, MidiEvent::ProgramChange { channel: 0, program: 0 })
        .event(0, MidiEvent::ProgramChange { channel: 1, program: 33 });

    for bar in 0..bars {
        let chord = chords[bar as usize % chords.len()];
        let bar_start = bar * 4 * PPQ;

        builder = builder.note(bar_start, 1, chord[0] - 24, 96, 4 * PPQ - eighth);
        for step in 0..8u32 {
            let key = chord[step as usize % 3] + if step >= 4 { 12 } else { 0 };
            let velocity = if step % 2 == 0 { 100 } else { 72 };
            builder = builder.note(bar_start + step * eighth, 0, key, velocity, eighth - 30);
        }
    }

    builder.build()
}
