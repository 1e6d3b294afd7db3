//! Styling helpers for terminal output.

use owo_colors::{OwoColorize, colors::css};

/// Columns below which the list table clips its text cells harder.
const COMFORTABLE_WIDTH: u16 = 100;

/// Whether stdout is too narrow for a full-width table.
pub fn is_narrow() -> bool {
    terminal_size::terminal_size().is_some_and(|(width, _)| width.0 < COMFORTABLE_WIDTH)
}

fn color_enabled() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

#[derive(Clone, Copy)]
enum Style {
    Success,
    Warning,
    Info,
    Dim,
}

fn paint(text: &str, style: Style) -> String {
    if !color_enabled() {
        return text.to_string();
    }

    match style {
        Style::Success => text.fg::<css::Green>().to_string(),
        Style::Warning => text.fg::<css::Orange>().to_string(),
        Style::Info => text.fg::<css::LightBlue>().to_string(),
        Style::Dim => text.dimmed().to_string(),
    }
}

/// Conditional styling for user-facing strings.
///
/// Styles apply only when stdout reports color support, so piped output
/// stays plain.
pub trait Colorize {
    /// Green, for completed actions.
    fn success(&self) -> String;
    /// Orange, for rejections and degraded outcomes.
    fn warning(&self) -> String;
    /// Blue, for neutral state changes.
    fn info(&self) -> String;
    /// Dimmed, for secondary detail.
    fn dim(&self) -> String;
}

impl Colorize for str {
    fn success(&self) -> String {
        paint(self, Style::Success)
    }

    fn warning(&self) -> String {
        paint(self, Style::Warning)
    }

    fn info(&self) -> String {
        paint(self, Style::Info)
    }

    fn dim(&self) -> String {
        paint(self, Style::Dim)
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}
