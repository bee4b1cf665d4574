//! PlaybackScheduler - background execution context for playback
//!
//! Each `start` spawns one thread that runs a cooperative loop over two
//! event kinds: a stop request from the owner, and expiry of the single
//! one-shot timer armed by the `SequenceSource`. The source is moved into
//! the thread for the session and handed back when the thread exits.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, select, Receiver, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use super::source::{Deadline, PlaybackContext, SequenceSource, StopReason};
use super::SchedulerError;

/// Messages from the owning thread to the playback thread
#[derive(Debug, Clone, Copy)]
enum Control {
    Stop,
}

/// A live playback thread
struct Session<S> {
    control: Sender<Control>,
    handle: JoinHandle<S>,
}

/// Drives a `SequenceSource` from its own thread.
pub struct PlaybackScheduler<S: SequenceSource + Send + 'static> {
    /// The source while idle (None while a session owns it)
    source: Option<S>,
    /// Current session, if started and not yet reaped
    session: Option<Session<S>>,
    /// Number of sessions started so far
    sessions: u64,
    /// Name given to playback threads
    thread_name: String,
}

impl<S: SequenceSource + Send + 'static> PlaybackScheduler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            session: None,
            sessions: 0,
            thread_name: "midiplay-playback".to_string(),
        }
    }

    /// Set the name of spawned playback threads
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Start a playback session. No-op if one is already running.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        self.reap()?;
        if self.session.is_some() {
            trace!("start ignored, playback already running");
            return Ok(());
        }

        let source = self.source.take().ok_or(SchedulerError::SourceUnavailable)?;
        let (control_tx, control_rx) = channel::unbounded();
        let session_id = self.sessions + 1;

        let handle = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run_session(source, control_rx, session_id))?;

        self.sessions = session_id;
        self.session = Some(Session {
            control: control_tx,
            handle,
        });
        debug!(session = session_id, "playback thread spawned");
        Ok(())
    }

    /// Ask the playback thread to exit at its next opportunity.
    ///
    /// Does not wait; `on_playback_stopped` may still be pending when this
    /// returns. No-op when nothing is running.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            // A closed channel means the thread is already on its way out
            if session.control.send(Control::Stop).is_err() {
                trace!("stop after session exit");
            }
        }
    }

    /// Whether a playback thread is alive
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Block until the current session exits, then take the source back.
    pub fn wait(&mut self) -> Result<(), SchedulerError> {
        let Some(Session { control, handle }) = self.session.take() else {
            return Ok(());
        };
        // Keep the sender alive so joining does not read as a disconnect
        let joined = handle.join();
        drop(control);

        match joined {
            Ok(source) => {
                self.source = Some(source);
                Ok(())
            }
            Err(_) => {
                warn!("playback thread panicked");
                Err(SchedulerError::SessionPanicked)
            }
        }
    }

    /// Number of sessions started so far
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// The source, if no session currently owns it
    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    /// Mutable access to the source, if no session currently owns it
    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.reap().ok()?;
        self.source.as_mut()
    }

    /// Stop, wait, and return the source
    pub fn into_source(mut self) -> Result<S, SchedulerError> {
        self.stop();
        self.wait()?;
        self.source.take().ok_or(SchedulerError::SourceUnavailable)
    }

    /// Collect a session that ended on its own
    fn reap(&mut self) -> Result<(), SchedulerError> {
        let finished = self
            .session
            .as_ref()
            .is_some_and(|session| session.handle.is_finished());
        if finished {
            self.wait()?;
        }
        Ok(())
    }
}

impl<S: SequenceSource + Send + 'static> Drop for PlaybackScheduler<S> {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
            if self.wait().is_err() {
                warn!("playback session ended abnormally during drop");
            }
        }
    }
}

/// Body of the playback thread
fn run_session<S: SequenceSource>(mut source: S, control: Receiver<Control>, session: u64) -> S {
    let mut ctx = PlaybackContext::new(session);

    debug!(session, "playback starting");
    source.on_playback_starting(&mut ctx);

    let reason = if ctx.is_finished() {
        StopReason::Finished
    } else {
        event_loop(&mut source, &mut ctx, &control)
    };

    source.on_playback_stopped(reason);
    debug!(session, ?reason, "playback stopped");
    source
}

/// Process stop requests and timer expiry until the session ends
fn event_loop<S: SequenceSource>(
    source: &mut S,
    ctx: &mut PlaybackContext,
    control: &Receiver<Control>,
) -> StopReason {
    loop {
        let timeout = match ctx.deadline() {
            Some(Deadline::At(at)) => channel::at(at),
            Some(Deadline::Never) | None => channel::never(),
        };

        select! {
            recv(control) -> msg => {
                return match msg {
                    Ok(Control::Stop) => StopReason::Requested,
                    Err(_) => StopReason::Disconnected,
                };
            }
            recv(timeout) -> _ => {
                // A pending stop wins over a timer that expired alongside it
                match control.try_recv() {
                    Ok(Control::Stop) => return StopReason::Requested,
                    Err(TryRecvError::Disconnected) => return StopReason::Disconnected,
                    Err(TryRecvError::Empty) => {}
                }

                if ctx.take_expired() {
                    trace!(session = ctx.session(), "timer fired");
                    source.on_timer(ctx);
                    if ctx.is_finished() {
                        return StopReason::Finished;
                    }
                }
            }
        }
    }
}
