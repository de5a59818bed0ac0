//! Symbols of a single FHIRPath document

use super::index::{SymbolEntry, SymbolKind};
use crate::analyzer::{Directive, DirectiveKind, DocumentDirectives, TYPE_PRESERVING_FUNCTIONS};
use crate::ast::{ExpressionKind, ExpressionNode, LiteralValue, Visitor, walk};
use crate::diagnostics::expression_spans;
use crate::error::Result;
use crate::parser::ExpressionEngine;
use crate::parser::span::Span;
use log::debug;
use std::sync::Arc;

/// Derives [`SymbolEntry`]s from directives and parsed statements
#[derive(Debug, Clone)]
pub struct DocumentSymbolExtractor {
    engine: Arc<dyn ExpressionEngine>,
}

impl DocumentSymbolExtractor {
    pub fn new(engine: Arc<dyn ExpressionEngine>) -> Self {
        Self { engine }
    }

    /// Symbols of `text`, in document order
    ///
    /// Statements that do not parse contribute nothing. Engine failures are
    /// returned so the caller can skip the whole file.
    pub async fn extract(&self, uri: &str, text: &str) -> Result<Vec<SymbolEntry>> {
        let directives = DocumentDirectives::parse(text);
        let context_type = directives.context_type();

        let mut symbols: Vec<SymbolEntry> = [&directives.resource, &directives.input_file, &directives.input]
            .into_iter()
            .flatten()
            .map(|directive| directive_symbol(uri, directive, context_type.as_deref()))
            .collect();

        for span in expression_spans(text) {
            let outcome = self.engine.parse(&span.text).await?;
            let Some(ast) = outcome.ast else {
                debug!("{uri}: skipping unparsable statement at {}", span.offset);
                continue;
            };
            let mut collector = SymbolCollector {
                uri,
                offset: span.offset,
                context_type: context_type.as_deref(),
                symbols: Vec::new(),
            };
            collector.visit(&ast);
            symbols.extend(collector.symbols);
        }

        symbols.sort_by_key(|s| (s.range.start, s.range.end));
        Ok(symbols)
    }
}

fn directive_symbol(uri: &str, directive: &Directive, context_type: Option<&str>) -> SymbolEntry {
    let entry = SymbolEntry::new(
        format!("@{}", directive.kind.name()),
        SymbolKind::Directive,
        uri,
        directive.span,
    );
    match directive.kind {
        DirectiveKind::Input => match context_type {
            Some(resource_type) => entry.with_container(resource_type),
            None => entry,
        },
        _ => entry.with_container(directive.value.as_str()),
    }
}

struct SymbolCollector<'a> {
    uri: &'a str,
    offset: usize,
    context_type: Option<&'a str>,
    symbols: Vec<SymbolEntry>,
}

impl SymbolCollector<'_> {
    fn push(&mut self, name: &str, kind: SymbolKind, span: Span) -> &mut SymbolEntry {
        self.symbols
            .push(SymbolEntry::new(name, kind, self.uri, span.offset(self.offset)));
        let last = self.symbols.len() - 1;
        &mut self.symbols[last]
    }

    /// Dotted navigation path of a chain, `None` once it leaves plain navigation
    fn dotted(&self, node: &ExpressionNode) -> Option<String> {
        match &node.kind {
            ExpressionKind::Identifier(name) if starts_uppercase(name) => Some(name.clone()),
            ExpressionKind::Identifier(name) => Some(match self.context_type {
                Some(context) => format!("{context}.{name}"),
                None => name.clone(),
            }),
            ExpressionKind::Path { base, name, .. } => {
                self.dotted(base).map(|base| format!("{base}.{name}"))
            }
            ExpressionKind::Index { base, .. } => self.dotted(base),
            ExpressionKind::MethodCall { base, name, .. }
                if TYPE_PRESERVING_FUNCTIONS.contains(&name.as_str()) =>
            {
                self.dotted(base)
            }
            ExpressionKind::Parenthesized(inner) => self.dotted(inner),
            _ => None,
        }
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

impl Visitor for SymbolCollector<'_> {
    fn visit(&mut self, node: &ExpressionNode) {
        match &node.kind {
            ExpressionKind::Identifier(name) if starts_uppercase(name) => {
                self.push(name, SymbolKind::ResourceType, node.span)
                    .fhir_path = Some(name.clone());
            }
            ExpressionKind::Identifier(name) => {
                let path = self.dotted(node);
                let container = self.context_type.map(str::to_string);
                let entry = self.push(name, SymbolKind::Property, node.span);
                entry.fhir_path = path;
                entry.container_name = container;
            }
            ExpressionKind::Path {
                base,
                name,
                name_span,
            } => {
                let container = self.dotted(base);
                let path = self.dotted(node);
                let entry = self.push(name, SymbolKind::Property, *name_span);
                entry.container_name = container;
                entry.fhir_path = path;
            }
            ExpressionKind::MethodCall {
                base,
                name,
                name_span,
                args,
            } => {
                let container = self.dotted(base);
                self.push(name, SymbolKind::Function, *name_span).container_name = container;
                if name == "defineVariable" {
                    self.define_variable(args);
                }
            }
            ExpressionKind::FunctionCall { name, args } => {
                let span = Span::new(node.span.start, node.span.start + name.len());
                self.push(name, SymbolKind::Function, span);
                if name == "defineVariable" {
                    self.define_variable(args);
                }
            }
            _ => {}
        }
        walk(self, node);
    }
}

impl SymbolCollector<'_> {
    fn define_variable(&mut self, args: &[ExpressionNode]) {
        if let Some(first) = args.first()
            && let ExpressionKind::Literal(LiteralValue::String(name)) = &first.kind
        {
            self.push(&format!("%{name}"), SymbolKind::Variable, first.span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PathExpressionEngine;
    use pretty_assertions::assert_eq;

    async fn extract(text: &str) -> Vec<SymbolEntry> {
        DocumentSymbolExtractor::new(Arc::new(PathExpressionEngine::default()))
            .extract("file:///doc.fhirpath", text)
            .await
            .unwrap()
    }

    fn summary(symbols: &[SymbolEntry]) -> Vec<(&str, SymbolKind, Option<&str>)> {
        symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.fhir_path.as_deref()))
            .collect()
    }

    #[tokio::test]
    async fn test_extracts_chain_symbols() {
        let symbols = extract("Patient.name.where(use = 'official').given").await;
        assert_eq!(
            summary(&symbols),
            vec![
                ("Patient", SymbolKind::ResourceType, Some("Patient")),
                ("name", SymbolKind::Property, Some("Patient.name")),
                ("where", SymbolKind::Function, None),
                ("use", SymbolKind::Property, Some("use")),
                ("given", SymbolKind::Property, Some("Patient.name.given")),
            ]
        );
        assert_eq!(symbols[1].container_name.as_deref(), Some("Patient"));
        assert_eq!(symbols[1].range, Span::new(8, 12));
    }

    #[tokio::test]
    async fn test_context_type_prefixes_bare_paths() {
        let symbols = extract("// @resource Patient\nname.family").await;
        assert_eq!(
            summary(&symbols),
            vec![
                ("@resource", SymbolKind::Directive, None),
                ("name", SymbolKind::Property, Some("Patient.name")),
                ("family", SymbolKind::Property, Some("Patient.name.family")),
            ]
        );
        assert_eq!(symbols[0].container_name.as_deref(), Some("Patient"));
        assert_eq!(symbols[1].range, Span::new(21, 25));
    }

    #[tokio::test]
    async fn test_define_variable_and_skipped_statements() {
        let symbols = extract("Patient.(\nPatient.defineVariable('ids', identifier)").await;
        let names: Vec<_> = symbols.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("Patient", SymbolKind::ResourceType),
                ("defineVariable", SymbolKind::Function),
                ("%ids", SymbolKind::Variable),
                ("identifier", SymbolKind::Property),
            ]
        );
        assert_eq!(symbols[0].range.start, 10);
    }
}
