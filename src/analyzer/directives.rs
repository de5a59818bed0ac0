//! Directive parsing (`@resource`, `@inputfile`, `@input`)
//!
//! Directives live in `//` comment lines. When a kind appears more than once
//! the last occurrence wins.

use crate::parser::span::Span;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Directive names offered by completion
pub const DIRECTIVE_NAMES: &[(&str, &str)] = &[
    ("resource", "Resource type the expressions are evaluated against"),
    ("inputfile", "JSON file holding the input resource"),
    ("input", "Inline JSON input resource"),
];

/// Type of directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// `@resource Patient`
    Resource,
    /// `@inputfile path/to/file.json`
    InputFile,
    /// `@input { ... }`
    Input,
}

impl DirectiveKind {
    /// Parse a directive name as written after `@`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "resource" => Some(Self::Resource),
            "inputfile" | "input-file" => Some(Self::InputFile),
            "input" => Some(Self::Input),
            _ => None,
        }
    }

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::InputFile => "inputfile",
            Self::Input => "input",
        }
    }
}

/// Cursor position inside a directive comment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveContext {
    /// Directive name as typed so far, without `@`
    pub directive_type: String,
    /// Text after the directive name
    pub directive_value: String,
    /// Token under the cursor
    pub current_token: String,
    /// Cursor is still on the directive name
    pub is_naming: bool,
}

impl DirectiveContext {
    /// Parsed directive kind, if the name is complete and known
    pub fn kind(&self) -> Option<DirectiveKind> {
        DirectiveKind::from_name(&self.directive_type)
    }
}

/// Byte offset of the `@` in a `// @name` line, if the line is one
fn directive_marker(line: &str) -> Option<usize> {
    let indent = line.len() - line.trim_start().len();
    let body = line[indent..].strip_prefix("//")?;
    let gap = body.len() - body.trim_start().len();
    body[gap..].starts_with('@').then_some(indent + 2 + gap)
}

fn name_end(line: &str, at: usize) -> usize {
    line[at + 1..]
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
        .map(|(i, _)| at + 1 + i)
        .unwrap_or(line.len())
}

/// Recognize a directive comment and the cursor's role in it
pub fn detect_directive(line: &str, cursor: usize) -> Option<DirectiveContext> {
    let at = directive_marker(line)?;
    let cursor = cursor.min(line.len());
    if cursor <= at || !line.is_char_boundary(cursor) {
        return None;
    }
    let end = name_end(line, at);
    let directive_type = line[at + 1..end].to_string();

    if cursor <= end {
        return Some(DirectiveContext {
            current_token: line[at + 1..cursor].to_string(),
            directive_type,
            directive_value: String::new(),
            is_naming: true,
        });
    }

    let prefix = &line[end..cursor];
    let token_start = prefix
        .rfind(char::is_whitespace)
        .map(|i| i + 1)
        .unwrap_or(0);
    Some(DirectiveContext {
        directive_type,
        directive_value: line[end..].trim().to_string(),
        current_token: prefix[token_start..].to_string(),
        is_naming: false,
    })
}

/// A directive found in a document
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    /// Trimmed value text
    pub value: String,
    /// Zero-based line of the directive
    pub line: usize,
    /// Byte range of the value in the document
    pub span: Span,
}

/// Problem found while reading directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveIssue {
    pub message: String,
    pub span: Span,
}

/// Directives of a document after applying last-wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentDirectives {
    /// Last `@resource`
    pub resource: Option<Directive>,
    /// Last `@inputfile`
    pub input_file: Option<Directive>,
    /// Last `@input`
    pub input: Option<Directive>,
    /// Parsed JSON of the last valid `@input`
    pub input_resource: Option<JsonValue>,
    /// Malformed or unknown directives
    pub issues: Vec<DirectiveIssue>,
}

impl DocumentDirectives {
    /// Scan every comment line of a document
    pub fn parse(text: &str) -> Self {
        let mut directives = Self::default();
        let lines: Vec<(usize, &str)> = super::context::lines_with_offsets(text).collect();

        let mut index = 0;
        while index < lines.len() {
            let (line_start, line) = lines[index];
            let line_number = index;
            index += 1;

            let Some(at) = directive_marker(line) else {
                continue;
            };
            let end = name_end(line, at);
            let name = &line[at + 1..end];
            let raw_value = &line[end..];
            let value_offset = end + (raw_value.len() - raw_value.trim_start().len());
            let mut value = raw_value.trim().to_string();
            let mut span = Span::new(line_start + value_offset, line_start + value_offset + value.len());

            let Some(kind) = DirectiveKind::from_name(name) else {
                directives.issues.push(DirectiveIssue {
                    message: format!("Unknown directive '@{name}'"),
                    span: Span::new(line_start + at, line_start + end),
                });
                continue;
            };

            if kind == DirectiveKind::Input {
                // JSON may continue on following comment lines until braces balance
                while brace_balance(&value) > 0 {
                    let Some(&(next_start, next_line)) = lines.get(index) else {
                        break;
                    };
                    let Some(rest) = next_line.trim_start().strip_prefix("//") else {
                        break;
                    };
                    if directive_marker(next_line).is_some() {
                        break;
                    }
                    value.push('\n');
                    value.push_str(rest.trim());
                    span.end = next_start + next_line.len();
                    index += 1;
                }
            }

            if value.is_empty() {
                directives.issues.push(DirectiveIssue {
                    message: format!("Directive '@{}' requires a value", kind.name()),
                    span: Span::new(line_start + at, line_start + end),
                });
                continue;
            }

            let directive = Directive {
                kind,
                value,
                line: line_number,
                span,
            };
            match kind {
                DirectiveKind::Resource => directives.resource = Some(directive),
                DirectiveKind::InputFile => directives.input_file = Some(directive),
                DirectiveKind::Input => {
                    match serde_json::from_str::<JsonValue>(&directive.value) {
                        Ok(json) => directives.input_resource = Some(json),
                        Err(err) => {
                            directives.issues.push(DirectiveIssue {
                                message: format!("Invalid JSON in @input: {err}"),
                                span: directive.span,
                            });
                            directives.input_resource = None;
                        }
                    }
                    directives.input = Some(directive);
                }
            }
        }

        directives
    }

    /// Type expressions in this document are evaluated against
    ///
    /// `@resource` takes precedence over the `resourceType` of `@input`.
    pub fn context_type(&self) -> Option<String> {
        if let Some(resource) = &self.resource {
            return Some(resource.value.clone());
        }
        self.input_resource
            .as_ref()
            .and_then(|json| json.get("resourceType"))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    }

    /// Resolve `@inputfile` against a base directory, without touching the disk
    pub fn resolve_input_file(&self, base: &Path) -> Option<PathBuf> {
        let directive = self.input_file.as_ref()?;
        let path = Path::new(&directive.value);
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        })
    }
}

fn brace_balance(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_directive_name() {
        let context = detect_directive("// @res", 7).unwrap();
        assert!(context.is_naming);
        assert_eq!(context.current_token, "res");
        assert_eq!(context.directive_type, "res");
    }

    #[test]
    fn test_detect_directive_value() {
        let line = "// @resource Pat";
        let context = detect_directive(line, line.len()).unwrap();
        assert!(!context.is_naming);
        assert_eq!(context.kind(), Some(DirectiveKind::Resource));
        assert_eq!(context.directive_value, "Pat");
        assert_eq!(context.current_token, "Pat");
    }

    #[test]
    fn test_plain_comment_is_not_directive() {
        assert!(detect_directive("// see @john", 12).is_none());
        assert!(detect_directive("Patient.name", 5).is_none());
        assert!(detect_directive("// @resource Patient", 2).is_none());
    }

    #[test]
    fn test_last_directive_wins() {
        let text = "// @resource Patient\nname\n// @resource Observation\nstatus";
        let directives = DocumentDirectives::parse(text);
        let resource = directives.resource.unwrap();
        assert_eq!(resource.value, "Observation");
        assert_eq!(resource.line, 2);
        assert_eq!(&text[resource.span.start..resource.span.end], "Observation");
    }

    #[test]
    fn test_input_resource_type_is_fallback_context() {
        let directives = DocumentDirectives::parse(r#"// @input {"resourceType": "Patient", "id": "p1"}"#);
        assert_eq!(directives.context_type().as_deref(), Some("Patient"));
        assert!(directives.issues.is_empty());

        let directives = DocumentDirectives::parse(
            "// @input {\"resourceType\": \"Patient\"}\n// @resource Observation",
        );
        assert_eq!(directives.context_type().as_deref(), Some("Observation"));
    }

    #[test]
    fn test_multiline_input() {
        let text = "// @input {\n//   \"resourceType\": \"Observation\"\n// }\nstatus";
        let directives = DocumentDirectives::parse(text);
        assert_eq!(directives.context_type().as_deref(), Some("Observation"));
    }

    #[test]
    fn test_invalid_input_json_is_reported() {
        let directives = DocumentDirectives::parse("// @input {not json}");
        assert_eq!(directives.issues.len(), 1);
        assert!(directives.issues[0].message.starts_with("Invalid JSON in @input"));
        assert!(directives.input.is_some());
        assert!(directives.context_type().is_none());
    }

    #[test]
    fn test_unknown_and_empty_directives() {
        let directives = DocumentDirectives::parse("// @resourc Patient\n// @resource");
        let messages: Vec<_> = directives.issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Unknown directive '@resourc'",
                "Directive '@resource' requires a value"
            ]
        );
    }

    #[test]
    fn test_resolve_input_file() {
        let directives = DocumentDirectives::parse("// @inputfile data/pt.json");
        assert_eq!(
            directives.resolve_input_file(Path::new("/w")),
            Some(PathBuf::from("/w/data/pt.json"))
        );
        assert_eq!(DocumentDirectives::parse("name").resolve_input_file(Path::new("/w")), None);
    }
}
