//! Core diagnostic types
//!
//! Diagnostics carry byte ranges into the validated document, a stable code
//! and an optional quick fix replacing a range with suggested text.

use crate::parser::span::Span;
use serde::Serialize;
use std::fmt;

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error that prevents evaluation
    Error,
    /// Warning about potential issues
    Warning,
    /// Informational message
    Info,
    /// Hint for improvement
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(label)
    }
}

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticCode {
    /// Expression does not parse
    SyntaxError,
    /// Segment is not an element of the navigated type
    PropertyNotFound,
    /// Root identifier looks like a type the schema does not know
    UnknownResourceType,
    /// Concrete choice name with a type the choice element does not allow
    InvalidChoiceProperty,
    /// Operation does not fit the element's cardinality
    CardinalityMismatch,
    /// Existence test on a mandatory element
    RequiredElement,
    /// Malformed or unknown directive comment
    InvalidDirective,
    /// `%` variable that is neither built in nor defined
    UnknownVariable,
}

impl DiagnosticCode {
    /// Kebab-case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SyntaxError => "syntax-error",
            DiagnosticCode::PropertyNotFound => "property-not-found",
            DiagnosticCode::UnknownResourceType => "unknown-resource-type",
            DiagnosticCode::InvalidChoiceProperty => "invalid-choice-property",
            DiagnosticCode::CardinalityMismatch => "cardinality-mismatch",
            DiagnosticCode::RequiredElement => "required-element",
            DiagnosticCode::InvalidDirective => "invalid-directive",
            DiagnosticCode::UnknownVariable => "unknown-variable",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edit that resolves a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickFix {
    /// Title shown to the user
    pub title: String,
    /// Byte range to replace
    pub range: Span,
    /// Replacement text
    pub replacement: String,
}

impl QuickFix {
    /// Replace `range` with `replacement`, titled "Change to '...'"
    pub fn replace(range: Span, replacement: impl Into<String>) -> Self {
        let replacement = replacement.into();
        Self {
            title: format!("Change to '{replacement}'"),
            range,
            replacement,
        }
    }
}

/// A diagnostic message with location and severity information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Byte range in the document
    pub range: Span,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_fix: Option<QuickFix>,
}

impl Diagnostic {
    /// Create a diagnostic
    pub fn new(code: DiagnosticCode, severity: Severity, range: Span, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            range,
            message: message.into(),
            quick_fix: None,
        }
    }

    /// Create a new error diagnostic
    pub fn error(code: DiagnosticCode, range: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, range, message)
    }

    /// Create a new warning diagnostic
    pub fn warning(code: DiagnosticCode, range: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, range, message)
    }

    /// Create a new info diagnostic
    pub fn info(code: DiagnosticCode, range: Span, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, range, message)
    }

    /// Attach a quick fix
    pub fn with_quick_fix(mut self, quick_fix: QuickFix) -> Self {
        self.quick_fix = Some(quick_fix);
        self
    }

    /// Shift the range by `by` bytes
    pub fn offset(mut self, by: usize) -> Self {
        self.range = self.range.offset(by);
        if let Some(fix) = self.quick_fix.as_mut() {
            fix.range = fix.range.offset(by);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_codes_in_kebab_case() {
        let diagnostic = Diagnostic::error(
            DiagnosticCode::PropertyNotFound,
            Span::new(8, 11),
            "Property 'nme' not found",
        )
        .with_quick_fix(QuickFix::replace(Span::new(8, 11), "name"));
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["code"], "property-not-found");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["quickFix"]["replacement"], "name");
        assert_eq!(json["quickFix"]["title"], "Change to 'name'");
    }

    #[test]
    fn test_offset_moves_fix_too() {
        let diagnostic = Diagnostic::warning(DiagnosticCode::CardinalityMismatch, Span::new(0, 3), "x")
            .with_quick_fix(QuickFix::replace(Span::new(1, 2), "y"))
            .offset(10);
        assert_eq!(diagnostic.range, Span::new(10, 13));
        assert_eq!(diagnostic.quick_fix.unwrap().range, Span::new(11, 12));
    }

    #[test]
    fn test_code_display() {
        assert_eq!(DiagnosticCode::InvalidDirective.to_string(), "invalid-directive");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
