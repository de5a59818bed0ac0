// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cursor context classification
//!
//! Works on raw text only: the cursor usually sits inside an expression that
//! does not parse yet, so nothing here depends on a successful parse.

use crate::analyzer::directives::{DirectiveContext, detect_directive};
use crate::ast::{ChainStep, ExpressionKind};
use crate::parser::parse_expression;
use once_cell::sync::Lazy;
use regex::Regex;

static PARENT_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\w.\[\]()]+)\.\w*$").expect("parent expression pattern is valid")
});

/// Functions whose arguments are evaluated once per element of their input
pub const ITERATING_FUNCTIONS: &[&str] = &[
    "where", "select", "exists", "all", "any", "repeat", "aggregate", "sort",
];

/// Functions that return a subset of their input, keeping its type
pub const TYPE_PRESERVING_FUNCTIONS: &[&str] = &[
    "where", "first", "last", "tail", "skip", "take", "single", "distinct", "intersect",
    "exclude", "union", "combine", "repeat", "sort",
];

/// One `;`-separated statement within a line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSpan {
    /// Trimmed statement text
    pub text: String,
    /// Byte column of the first character
    pub start_col: usize,
    /// Byte column just past the last character
    pub end_col: usize,
}

/// Split a line on top-level `;`, ignoring separators inside quoted strings
pub fn split_statements(line: &str) -> Vec<StatementSpan> {
    let mut statements = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut segment_start = 0;

    let mut push_segment = |start: usize, end: usize| {
        let raw = &line[start..end];
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let start_col = start + (raw.len() - raw.trim_start().len());
        statements.push(StatementSpan {
            text: trimmed.to_string(),
            start_col,
            end_col: start_col + trimmed.len(),
        });
    };

    for (index, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escaped = true,
            (Some(open), c) if c == open => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, ';') => {
                push_segment(segment_start, index);
                segment_start = index + 1;
            }
            _ => {}
        }
    }
    push_segment(segment_start, line.len());
    statements
}

/// Statement containing the cursor, else the last statement
pub fn select_statement(statements: &[StatementSpan], cursor: usize) -> Option<&StatementSpan> {
    statements
        .iter()
        .find(|s| s.start_col <= cursor && cursor <= s.end_col)
        .or_else(|| statements.last())
}

/// Call enclosing the cursor, e.g. `where` in `name.where(gi|`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingFunction {
    /// Function name
    pub name: String,
    /// Expression the function is invoked on, if any
    pub base: Option<String>,
}

/// Classification of the cursor position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionContext {
    /// Statement text the cursor is in
    pub text: String,
    /// Cursor offset within `text`
    pub cursor_offset: usize,
    /// Character that triggered the request
    pub trigger_char: Option<char>,
    /// Token under the cursor
    pub current_token: Option<String>,
    /// Token before the current one
    pub previous_token: Option<String>,
    pub is_after_dot: bool,
    pub is_in_function: bool,
    pub is_in_brackets: bool,
    pub is_in_directive: bool,
    /// Expression left of the final dot, used to find the type to navigate from
    pub parent_expression: Option<String>,
    /// Innermost call whose argument list holds the cursor
    pub enclosing_function: Option<EnclosingFunction>,
    /// Directive details when `is_in_directive`
    pub directive: Option<DirectiveContext>,
}

impl ExpressionContext {
    /// Token under the cursor, empty when there is none
    pub fn token(&self) -> &str {
        self.current_token.as_deref().unwrap_or_default()
    }
}

fn is_token_boundary(ch: char) -> bool {
    matches!(ch, ' ' | '.' | '(' | '[' | ',') || ch.is_whitespace()
}

/// Whether the prefix ends inside an unclosed `open` delimiter
fn is_inside(prefix: &str, open: char, close: char) -> bool {
    let mut depth: i32 = 0;
    for ch in prefix.chars().rev() {
        if ch == close {
            depth += 1;
        } else if ch == open {
            depth -= 1;
            if depth < 0 {
                return true;
            }
        }
    }
    false
}

fn enclosing_function(prefix: &str) -> Option<EnclosingFunction> {
    let mut depth: i32 = 0;
    let mut open_at = None;
    for (index, ch) in prefix.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth -= 1;
                if depth < 0 {
                    open_at = Some(index);
                    break;
                }
            }
            _ => {}
        }
    }
    let head = prefix[..open_at?].trim_end();
    let name_start = head
        .char_indices()
        .rev()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let name = &head[name_start..];
    if name.is_empty() {
        return None;
    }
    let base = head[..name_start]
        .strip_suffix('.')
        .and_then(|before| PARENT_EXPRESSION.captures(&format!("{before}.")).map(|c| c[1].to_string()));
    Some(EnclosingFunction {
        name: name.to_string(),
        base,
    })
}

/// Classify the cursor position within a statement
pub fn classify(text: &str, cursor: usize, trigger_char: Option<char>) -> ExpressionContext {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    let prefix = &text[..cursor];

    let token_start = prefix
        .char_indices()
        .rev()
        .find(|(_, c)| is_token_boundary(*c))
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let token_end = text[cursor..]
        .char_indices()
        .find(|(_, c)| is_token_boundary(*c) || matches!(c, ')' | ']'))
        .map(|(i, _)| cursor + i)
        .unwrap_or(text.len());
    let current_token = Some(text[token_start..token_end].to_string()).filter(|t| !t.is_empty());

    let before_token = prefix[..token_start].trim_end_matches(is_token_boundary);
    let previous_token = before_token
        .rsplit(is_token_boundary)
        .next()
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let is_after_dot = trigger_char == Some('.') || prefix[..token_start].trim_end().ends_with('.');
    let parent_expression = PARENT_EXPRESSION
        .captures(prefix)
        .map(|captures| captures[1].to_string());
    let is_in_function = is_inside(prefix, '(', ')');

    ExpressionContext {
        text: text.to_string(),
        cursor_offset: cursor,
        trigger_char,
        current_token,
        previous_token,
        is_after_dot,
        is_in_function,
        is_in_brackets: is_inside(prefix, '[', ']'),
        is_in_directive: false,
        parent_expression,
        enclosing_function: if is_in_function {
            enclosing_function(prefix)
        } else {
            None
        },
        directive: None,
    }
}

/// Locate the line holding `offset`, returning its start offset and text
pub fn line_at(text: &str, offset: usize) -> (usize, &str) {
    let offset = offset.min(text.len());
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(text.len());
    (start, text[start..end].trim_end_matches('\r'))
}

/// Lines of a document with their byte offsets
pub fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, line.trim_end_matches('\r'))
    })
}

/// Zero-based line and byte column of an offset
pub fn position_at(text: &str, offset: usize) -> (usize, usize) {
    let (line_start, _) = line_at(text, offset);
    let line = text[..line_start].matches('\n').count();
    (line, offset.min(text.len()) - line_start)
}

/// Classify the cursor position within a whole document
pub fn analyze_document(document: &str, offset: usize, trigger_char: Option<char>) -> ExpressionContext {
    let mut offset = offset.min(document.len());
    while !document.is_char_boundary(offset) {
        offset -= 1;
    }
    let (line_start, line) = line_at(document, offset);
    let column = (offset - line_start).min(line.len());

    if let Some(directive) = detect_directive(line, column) {
        return ExpressionContext {
            text: line.to_string(),
            cursor_offset: column,
            trigger_char,
            current_token: Some(directive.current_token.clone()).filter(|t| !t.is_empty()),
            is_in_directive: true,
            directive: Some(directive),
            ..Default::default()
        };
    }

    let statements = split_statements(line);
    match select_statement(&statements, column) {
        Some(statement) => {
            let within = column.saturating_sub(statement.start_col);
            classify(&statement.text, within, trigger_char)
        }
        None => ExpressionContext {
            trigger_char,
            ..Default::default()
        },
    }
}

/// Request-scoped navigation target derived from an expression context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationContext {
    /// Type navigation starts from
    pub resource_type: Option<String>,
    /// Property segments after the root
    pub property_path: Vec<String>,
    /// Whether the final segment is still being typed
    pub is_partial: bool,
    /// Token under the cursor
    pub current_token: Option<String>,
}

/// Identifier segments of a navigable expression
///
/// Indexers and type-preserving calls are skipped; any other call or a
/// non-identifier root makes the expression non-navigable.
pub fn path_segments(expression: &str) -> Option<Vec<String>> {
    let ast = parse_expression(expression).ok()?;
    let chain = ast.chain();
    let mut segments = match &chain.root.kind {
        ExpressionKind::Identifier(name) => vec![name.clone()],
        ExpressionKind::Variable { name, sigil: '$' } if name == "this" => Vec::new(),
        _ => return None,
    };
    for step in chain.steps {
        match step {
            ChainStep::Member { name, .. } => segments.push(name.to_string()),
            ChainStep::Index { .. } => {}
            ChainStep::Call { name, .. } if TYPE_PRESERVING_FUNCTIONS.contains(&name) => {}
            ChainStep::Call { .. } => return None,
        }
    }
    Some(segments)
}

impl NavigationContext {
    /// Build the navigation target for a context
    ///
    /// `is_type_name` decides whether a leading identifier names a type; when
    /// it does not, navigation starts from `context_type`.
    pub fn from_expression_context(
        context: &ExpressionContext,
        context_type: Option<&str>,
        is_type_name: impl Fn(&str) -> bool,
    ) -> Option<Self> {
        let segments = if context.is_after_dot {
            path_segments(context.parent_expression.as_deref()?)?
        } else if let Some(EnclosingFunction {
            name,
            base: Some(base),
        }) = &context.enclosing_function
        {
            if !ITERATING_FUNCTIONS.contains(&name.as_str()) {
                return None;
            }
            path_segments(base)?
        } else {
            Vec::new()
        };

        let (resource_type, property_path) = match segments.split_first() {
            Some((root, rest)) if is_type_name(root) => (Some(root.clone()), rest.to_vec()),
            _ => (context_type.map(str::to_string), segments),
        };
        resource_type.as_ref()?;

        Some(Self {
            resource_type,
            property_path,
            is_partial: context.current_token.is_some(),
            current_token: context.current_token.clone(),
        })
    }
}
