//! Terminal user interface for the recording widget.
//!
//! Renders a [`WidgetState`] snapshot: start/stop controls, status line with the
//! recording marker, the `MM:SS` timer, the playback preview, and the upload
//! form. Also turns key presses into [`WidgetCommand`]s.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use std::error::Error;
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::widget::WidgetState;
use crate::ui::error::draw_alert;

/// User input while the widget is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetCommand {
    /// No key pressed, or a key with no binding
    Continue,
    /// Start button ('r' or Enter)
    Start,
    /// Stop button ('s' or Space)
    Stop,
    /// Play the preview ('p')
    Preview,
    /// Save the form's file to the recordings directory ('w')
    Save,
    /// Submit the upload form ('u')
    Submit,
    /// Leave the widget (Escape, 'q' or Ctrl+C)
    Quit,
}

/// Maps a key to a widget command.
pub fn command_for_key(code: KeyCode, modifiers: KeyModifiers) -> WidgetCommand {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => WidgetCommand::Quit,
        KeyCode::Char('r') | KeyCode::Enter => WidgetCommand::Start,
        KeyCode::Char('s') | KeyCode::Char(' ') => WidgetCommand::Stop,
        KeyCode::Char('p') => WidgetCommand::Preview,
        KeyCode::Char('w') => WidgetCommand::Save,
        KeyCode::Char('u') => WidgetCommand::Submit,
        KeyCode::Char('q') | KeyCode::Esc => WidgetCommand::Quit,
        _ => WidgetCommand::Continue,
    }
}

const ACCENT: Color = Color::Rgb(185, 207, 212);
const FOREGROUND: Color = Color::Rgb(206, 224, 220);

/// Terminal UI for the recording widget.
pub struct RecorderTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl RecorderTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> Result<Self, Box<dyn Error>> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(RecorderTui { terminal })
    }

    /// Draws one frame of the widget.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, state: &WidgetState) -> Result<(), Box<dyn Error>> {
        self.terminal.draw(|frame| draw_widget(frame, state))?;
        Ok(())
    }

    /// Shows a blocking alert over the widget until any key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering or event polling fails
    pub fn show_alert(&mut self, message: &str) -> Result<(), Box<dyn Error>> {
        loop {
            self.terminal.draw(|frame| draw_alert(frame, message))?;
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Waits up to 50ms for a key and maps it to a command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self) -> Result<WidgetCommand, Box<dyn Error>> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    return Ok(WidgetCommand::Continue);
                }
                let command = command_for_key(key.code, key.modifiers);
                if command != WidgetCommand::Continue {
                    tracing::debug!("Key {:?} mapped to {:?}", key.code, command);
                }
                return Ok(command);
            }
        }
        Ok(WidgetCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn button<'a>(label: &'a str, key: &'a str, enabled: bool) -> Span<'a> {
    let text = format!(" [{key}] {label} ");
    if enabled {
        Span::styled(
            text,
            Style::default()
                .bg(ACCENT)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(text, Style::default().fg(Color::DarkGray))
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

/// Lays out the widget: controls, status, timer, preview, form, footer.
pub fn draw_widget(frame: &mut Frame, state: &WidgetState) {
    let area = frame.area();
    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(1),
    ])
    .split(area);

    let controls = Line::from(vec![
        button("Start", "r", state.start_enabled),
        Span::raw("  "),
        button("Stop", "s", state.stop_enabled),
    ]);
    frame.render_widget(Paragraph::new(controls), rows[0]);

    let status_style = if state.recording_marker {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(FOREGROUND)
    };
    frame.render_widget(
        Paragraph::new(Span::styled(state.status_text.as_str(), status_style)),
        rows[2],
    );

    let timer = Paragraph::new(Span::styled(
        state.timer_text.as_str(),
        Style::default().fg(FOREGROUND).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(timer, rows[3]);

    if let Some(preview) = &state.playback {
        let line = Line::from(vec![
            Span::raw("▶ "),
            Span::raw(preview.name()),
            Span::styled(
                format!("  {}  [p] play", format_size(preview.size())),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), rows[5]);
    }

    if state.form.visible {
        let file_line = match state.form.file() {
            Some(file) => format!("File:     {} ({})", file.name(), file.mime()),
            None => "File:     (waiting for recording...)".to_string(),
        };
        let duration_line = format!("Duration: {}", state.form.duration());
        let form = Paragraph::new(vec![
            Line::from(file_line),
            Line::from(duration_line),
            Line::from(Span::styled(
                "[u] submit  [w] save",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(Block::default().borders(Borders::ALL).title(" Upload "));
        frame.render_widget(form, rows[6]);
    }

    let footer_text = state
        .notice
        .clone()
        .unwrap_or_else(|| "r start · s stop · q quit".to_string());
    let footer =
        Paragraph::new(footer_text).style(Style::default().fg(ACCENT).bg(Color::Rgb(0, 0, 0)));
    frame.render_widget(footer, rows[7]);
}
