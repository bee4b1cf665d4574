// Purpose: playback execution context and the seam it drives

pub mod scheduler;
pub mod source;

pub use scheduler::PlaybackScheduler;
pub use source::{PlaybackContext, SequenceSource, StopReason};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("timer delay must be non-negative, got {0} ms")]
    NegativeDelay(i64),
    #[error("failed to spawn playback thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("playback thread panicked, sequence source was lost")]
    SessionPanicked,
    #[error("sequence source is unavailable")]
    SourceUnavailable,
}
