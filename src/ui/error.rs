//! Blocking alert display.
//!
//! Alerts take over the whole screen with centered text on red and stay until
//! a key is pressed. [`draw_alert`] renders onto any frame, so the recorder TUI
//! can raise alerts without leaving its terminal.

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::Paragraph};
use std::io::{self, Stdout};
use std::time::Duration;

const ALERT_BG: Color = Color::Rgb(255, 0, 0);
const ALERT_FG: Color = Color::Rgb(255, 255, 255);

/// Paints the full frame red and centers `message` at 80% width.
pub fn draw_alert(frame: &mut Frame, message: &str) {
    let area = frame.area();

    for y in area.y..area.y + area.height {
        for x in area.x..area.x + area.width {
            frame
                .buffer_mut()
                .set_string(x, y, " ", Style::default().bg(ALERT_BG));
        }
    }

    let padding_x = area.width / 10;
    let text_width = area.width / 10 * 8;

    let lines: Vec<Line> = message
        .lines()
        .chain(std::iter::once(""))
        .chain(std::iter::once("Press any key to continue"))
        .map(|line| {
            Line::from(Span::styled(
                line.to_string(),
                Style::default().fg(ALERT_FG).bg(ALERT_BG),
            ))
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true });

    let centered_area = Rect {
        x: area.x + padding_x,
        y: area.y + area.height / 3,
        width: text_width,
        height: area.height - area.height / 3,
    };

    frame.render_widget(paragraph, centered_area);
}

/// Terminal taken over for a single alert; restored on drop.
struct AlertTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl AlertTerminal {
    fn enter() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Self {
            terminal,
            restored: false,
        })
    }

    fn restore(&mut self) -> anyhow::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for AlertTerminal {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// Shows `message` full screen until a key is pressed, then restores the terminal.
///
/// For errors raised before the recorder TUI exists.
///
/// # Errors
/// - If the terminal cannot be taken over, drawn, or restored
pub fn show_blocking_error(message: &str) -> anyhow::Result<()> {
    let mut screen = AlertTerminal::enter()?;
    loop {
        screen.terminal.draw(|frame| draw_alert(frame, message))?;
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    break;
                }
            }
        }
    }
    screen.restore()
}
