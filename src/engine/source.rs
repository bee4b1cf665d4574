use std::time::{Duration, Instant};

use super::SchedulerError;

/// Why a playback session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `PlaybackScheduler::stop` was called
    Requested,
    /// The source called `PlaybackContext::finish`
    Finished,
    /// The scheduler handle went away without stopping
    Disconnected,
}

/// Logic driven by a `PlaybackScheduler`.
///
/// All three callbacks run on the scheduler's own thread, in order:
/// `on_playback_starting` once, `on_timer` zero or more times,
/// `on_playback_stopped` once.
pub trait SequenceSource {
    /// Prepare for playback. Usually arms the first timer.
    fn on_playback_starting(&mut self, ctx: &mut PlaybackContext);

    /// The armed one-shot timer elapsed. The timer is already disarmed;
    /// re-arm through `ctx` to get called again.
    fn on_timer(&mut self, ctx: &mut PlaybackContext);

    /// Playback ended. No timer callback follows this.
    fn on_playback_stopped(&mut self, reason: StopReason);
}

impl<T: SequenceSource + ?Sized> SequenceSource for Box<T> {
    fn on_playback_starting(&mut self, ctx: &mut PlaybackContext) {
        (**self).on_playback_starting(ctx)
    }

    fn on_timer(&mut self, ctx: &mut PlaybackContext) {
        (**self).on_timer(ctx)
    }

    fn on_playback_stopped(&mut self, reason: StopReason) {
        (**self).on_playback_stopped(reason)
    }
}

/// When an armed timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    At(Instant),
    /// The delay reaches past what `Instant` can represent
    Never,
}

/// Timer and lifecycle control handed to a `SequenceSource`.
///
/// Holds the single armed deadline of the session; arming again replaces it.
#[derive(Debug)]
pub struct PlaybackContext {
    deadline: Option<Deadline>,
    finished: bool,
    session: u64,
}

impl PlaybackContext {
    pub(crate) fn new(session: u64) -> Self {
        Self {
            deadline: None,
            finished: false,
            session,
        }
    }

    /// A context not owned by any scheduler, for driving a source by hand
    /// (offline rendering, benchmarks). Timer deadlines are recorded but
    /// nothing waits on them.
    pub fn new_detached() -> Self {
        Self::new(0)
    }

    /// Fire `on_timer` once, `delay` from now. Replaces any armed timer.
    pub fn arm_timer(&mut self, delay: Duration) {
        let deadline = match Instant::now().checked_add(delay) {
            Some(at) => Deadline::At(at),
            None => Deadline::Never,
        };
        if self.deadline.replace(deadline).is_some() {
            tracing::trace!(session = self.session, "re-armed pending timer");
        }
        tracing::trace!(session = self.session, delay_ms = delay.as_millis() as u64, "timer armed");
    }

    /// Millisecond variant of `arm_timer`. Negative delays are rejected.
    pub fn arm_timer_ms(&mut self, delay_ms: i64) -> Result<(), SchedulerError> {
        let delay = u64::try_from(delay_ms).map_err(|_| SchedulerError::NegativeDelay(delay_ms))?;
        self.arm_timer(Duration::from_millis(delay));
        Ok(())
    }

    /// Disarm the pending timer, if any.
    pub fn cancel_timer(&mut self) {
        if self.deadline.take().is_some() {
            tracing::trace!(session = self.session, "timer cancelled");
        }
    }

    pub fn is_timer_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// End the session once the current callback returns.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// 1-based counter of sessions run by the owning scheduler, 0 when detached
    pub fn session(&self) -> u64 {
        self.session
    }

    pub(crate) fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Whether `finish` was called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Disarm a timer whose deadline just passed.
    pub(crate) fn take_expired(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Delay until the armed deadline, zero if it already passed.
    #[cfg(test)]
    pub(crate) fn armed_delay(&self) -> Option<Duration> {
        self.deadline.map(|d| match d {
            Deadline::At(at) => at.saturating_duration_since(Instant::now()),
            Deadline::Never => Duration::MAX,
        })
    }
}
