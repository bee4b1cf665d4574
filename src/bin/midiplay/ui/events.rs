//! Event log widget - most recent MIDI events, newest at the bottom

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use midiplay::MidiEvent;

use super::UiState;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

fn note_name(key: u8) -> String {
    let octave = key as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[key as usize % 12], octave)
}

fn describe(event: &MidiEvent) -> (String, Color) {
    match *event {
        MidiEvent::NoteOn { key, velocity, .. } if velocity > 0 => (
            format!("note on   {:<4} vel {}", note_name(key), velocity),
            Color::Green,
        ),
        MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key, .. } => {
            (format!("note off  {}", note_name(key)), Color::DarkGray)
        }
        MidiEvent::ControlChange {
            controller, value, ..
        } => (format!("cc {} = {}", controller, value), Color::Magenta),
        MidiEvent::PitchBend { value, .. } => (format!("bend {}", value), Color::Magenta),
        MidiEvent::ProgramChange { program, .. } => {
            (format!("program {}", program), Color::Cyan)
        }
    }
}

/// Render the recent event list
pub fn render_events(frame: &mut Frame, area: Rect, state: &UiState) {
    let block = Block::default().title(" Events ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visible = inner.height as usize;
    let skip = state.recent.len().saturating_sub(visible);

    let lines: Vec<Line> = state
        .recent
        .iter()
        .skip(skip)
        .map(|event| {
            let (text, color) = describe(event);
            Line::from(vec![
                Span::styled(
                    format!(" ch{:<2} ", event.channel() + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(text, Style::default().fg(color)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}
