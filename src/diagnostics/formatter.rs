//! Rendering diagnostics for the command line
//!
//! Text output follows the rustc layout: a header, a `-->` location, the
//! offending source line with a caret underline and an optional `= help:`
//! line for the quick fix.

use super::diagnostic::{Diagnostic, Severity};
use crate::analyzer::{line_at, position_at};

/// How [`DiagnosticFormatter`] renders diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line report with a source snippet
    Text,
    /// Pretty-printed JSON array
    Json,
    /// One `line:col: severity: message` line per diagnostic
    Compact,
}

#[derive(Debug, Clone)]
pub struct DiagnosticFormatter {
    format: Format,
    origin: Option<String>,
    show_code: bool,
    show_quick_fixes: bool,
    color: bool,
}

impl DiagnosticFormatter {
    /// Colour is on whenever the `terminal` feature is enabled
    pub fn new(format: Format) -> Self {
        Self {
            format,
            origin: None,
            show_code: true,
            show_quick_fixes: true,
            color: cfg!(feature = "terminal"),
        }
    }

    /// Name printed before locations, usually the file path
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_code(mut self, show: bool) -> Self {
        self.show_code = show;
        self
    }

    pub fn with_quick_fixes(mut self, show: bool) -> Self {
        self.show_quick_fixes = show;
        self
    }

    /// Has no effect without the `terminal` feature
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color && cfg!(feature = "terminal");
        self
    }

    /// Render one diagnostic produced for `source`
    pub fn format(&self, diagnostic: &Diagnostic, source: &str) -> String {
        self.format_all(std::slice::from_ref(diagnostic), source)
    }

    /// Render diagnostics produced for `source`, in the given order
    pub fn format_all(&self, diagnostics: &[Diagnostic], source: &str) -> String {
        let render: fn(&Self, &Diagnostic, &str) -> String = match self.format {
            Format::Json => return to_json(diagnostics),
            Format::Text => Self::render_report,
            Format::Compact => Self::render_line,
        };
        diagnostics
            .iter()
            .map(|diagnostic| render(self, diagnostic, source))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `origin:line:col`, one-based
    fn location(&self, diagnostic: &Diagnostic, source: &str) -> String {
        let (line, column) = position_at(source, diagnostic.range.start);
        let position = format!("{}:{}", line + 1, column + 1);
        match &self.origin {
            Some(origin) => format!("{origin}:{position}"),
            None => position,
        }
    }

    fn code_suffix(&self, diagnostic: &Diagnostic) -> String {
        if self.show_code {
            format!(" [{}]", diagnostic.code)
        } else {
            String::new()
        }
    }

    fn render_report(&self, diagnostic: &Diagnostic, source: &str) -> String {
        let severity = self.paint(diagnostic.severity, &diagnostic.severity.to_string(), true);
        let mut out = format!(
            "{severity}: {}{}\n --> {}\n",
            diagnostic.message,
            self.code_suffix(diagnostic),
            self.location(diagnostic, source)
        );

        let start = diagnostic.range.start.min(source.len());
        let (line_start, line) = line_at(source, start);
        let (line_number, column) = position_at(source, start);
        // Multi-line ranges are underlined to the end of their first line
        let rest_of_line = line.len().saturating_sub(start - line_start);
        let width = (diagnostic.range.end.saturating_sub(start))
            .min(rest_of_line)
            .max(1);
        let carets = self.paint(diagnostic.severity, &"^".repeat(width), false);

        out.push_str(&format!("{:4} | {line}\n", line_number + 1));
        out.push_str(&format!("     | {}{carets}\n", " ".repeat(column)));

        if self.show_quick_fixes
            && let Some(fix) = &diagnostic.quick_fix
        {
            out.push_str(&format!("  = help: {}\n", fix.title));
        }
        out
    }

    fn render_line(&self, diagnostic: &Diagnostic, source: &str) -> String {
        let code = if self.show_code {
            format!("[{}] ", diagnostic.code)
        } else {
            String::new()
        };
        format!(
            "{}: {}: {code}{}",
            self.location(diagnostic, source),
            diagnostic.severity,
            diagnostic.message
        )
    }

    #[cfg(feature = "terminal")]
    fn paint(&self, severity: Severity, text: &str, bold: bool) -> String {
        use colored::{Color, Colorize};

        if !self.color {
            return text.to_string();
        }
        let color = match severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
            Severity::Info => Color::Blue,
            Severity::Hint => Color::Green,
        };
        let painted = text.color(color);
        let painted = if bold { painted.bold() } else { painted };
        painted.to_string()
    }

    #[cfg(not(feature = "terminal"))]
    fn paint(&self, _severity: Severity, text: &str, _bold: bool) -> String {
        text.to_string()
    }
}

impl Default for DiagnosticFormatter {
    fn default() -> Self {
        Self::new(Format::Text)
    }
}

fn to_json(diagnostics: &[Diagnostic]) -> String {
    serde_json::to_string_pretty(diagnostics).unwrap_or_else(|err| {
        log::warn!("failed to serialize diagnostics: {err}");
        String::from("[]")
    })
}
