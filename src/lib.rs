pub mod config;
pub mod engine; // Playback thread and timer loop
pub mod io;
pub mod player; // Song playback driven by the engine
pub mod sequencing; // Tick-based songs and tempo maps

pub use config::PlayerConfig;
pub use engine::{PlaybackContext, PlaybackScheduler, SchedulerError, SequenceSource, StopReason};
pub use io::{MidiEvent, MidiOutput};
pub use player::{MidiPlayer, PlayerError, PlayerState, PlayerStatus, StatusSink};
pub use sequencing::{Song, SongError};
