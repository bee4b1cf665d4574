//! TUI module for midiplay
//!
//! The UI thread owns the scheduler and only ever calls start/stop on it;
//! everything the player produces arrives through ring buffers.

mod events;
pub mod state;
mod transport;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use std::time::Duration;
use tracing::debug;

pub use state::UiState;

use super::app::Playback;
use events::render_events;
use transport::render_transport;

/// UI application state
pub struct UiApp {
    playback: Playback,
    state: UiState,
    /// Whether the app should quit
    should_quit: bool,
}

impl UiApp {
    pub fn new(playback: Playback, state: UiState) -> Self {
        Self {
            playback,
            state,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_playback();

            terminal.draw(|frame| self.render(frame))?;

            // Handle keyboard input (non-blocking, ~60fps)
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code)?;
                    }
                }
            }
        }

        self.playback.scheduler.stop();
        self.playback.scheduler.wait()?;
        Ok(())
    }

    /// Drain events and status updates from the playback thread
    fn poll_playback(&mut self) {
        while let Ok(event) = self.playback.events.pop() {
            self.state.push_event(event);
        }
        // Keep only the latest status
        while let Ok(status) = self.playback.status.pop() {
            self.state.status = status;
        }
    }

    fn handle_key(&mut self, key: KeyCode) -> EyreResult<()> {
        let scheduler = &mut self.playback.scheduler;
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') => {
                if scheduler.is_running() {
                    debug!("stop requested from UI");
                    scheduler.stop();
                } else {
                    debug!("start requested from UI");
                    scheduler.start()?;
                }
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                scheduler.stop();
                scheduler.wait()?;
                if let Some(player) = scheduler.source_mut() {
                    player.seek(0.0);
                }
                self.poll_playback();
                self.state.status.position_ms = 0.0;
            }
            _ => {}
        }
        Ok(())
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(6),    // Event log
                Constraint::Length(1), // Help bar
            ])
            .split(frame.area());

        render_transport(frame, chunks[0], &self.state);
        render_events(frame, chunks[1], &self.state);

        let help = Paragraph::new(" [Q] Quit  [Space] Start/Stop  [R] Rewind")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[2]);
    }
}
