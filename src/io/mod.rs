// Purpose - MIDI data model and event sinks

pub mod midi;
pub mod output;

pub use midi::MidiEvent;
pub use output::MidiOutput;
