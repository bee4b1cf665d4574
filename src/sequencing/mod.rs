pub mod song;

pub use song::{EventGroup, Song, SongBuilder, SongError, SongEvent, TempoChange};
