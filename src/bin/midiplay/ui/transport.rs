//! Transport bar widget - shows tempo, play state and position

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use midiplay::PlayerState;

use super::UiState;

/// Format milliseconds as m:ss.mmm
fn clock(ms: f64) -> String {
    let total = ms.max(0.0) as u64;
    format!("{}:{:02}.{:03}", total / 60_000, (total / 1000) % 60, total % 1000)
}

/// Render the transport bar
pub fn render_transport(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().title(" midiplay ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let (symbol, label, color) = match state.status.state {
        PlayerState::Playing => ("▶", "Playing", Color::Green),
        PlayerState::Stopped => ("■", "Stopped", Color::Yellow),
        PlayerState::Finished => ("■", "Finished", Color::Blue),
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" BPM: {:.0} x{:.2}  ", state.bpm, state.tempo_factor),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(format!("{} {}  ", symbol, label), Style::default().fg(color)),
        Span::styled(
            format!(
                "{} / {}  ",
                clock(state.status.position_ms),
                clock(state.status.duration_ms)
            ),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{} events", state.events_seen),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    // Status line on the left, progress gauge in whatever width remains
    let status_width = (line.width() as u16).min(inner.width);
    let status_area = Rect {
        width: status_width,
        ..inner
    };
    frame.render_widget(Paragraph::new(line), status_area);

    let gauge_area = Rect {
        x: inner.x + status_width,
        width: inner.width - status_width,
        ..inner
    };
    if gauge_area.width > 4 {
        let ratio = if state.status.duration_ms > 0.0 {
            (state.status.position_ms / state.status.duration_ms).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(ratio)
            .label("");
        frame.render_widget(gauge, gauge_area);
    }
}
