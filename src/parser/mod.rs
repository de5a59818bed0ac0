//! FHIRPath expression parsing
//!
//! The rest of the crate consumes parsing through the [`ExpressionEngine`]
//! trait. [`PathExpressionEngine`] is the bundled implementation backed by the
//! tokenizer and Pratt parser in this module.

#![warn(missing_docs)]

pub mod error;
pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use error::{ParseResult, SyntaxError};
pub use pratt::parse_expression;
pub use span::{Span, Spanned};

use crate::ast::{ExpressionKind, ExpressionNode, Visitor, walk};
use crate::cache::{CacheConfig, ResultCache};
use crate::error::EngineError;
use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// Result of parsing one expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    /// Parsed tree, absent when parsing failed
    pub ast: Option<Arc<ExpressionNode>>,
    /// Syntax errors positioned relative to the parsed text
    pub errors: Vec<SyntaxError>,
}

impl ParseOutcome {
    /// Whether the text parsed cleanly
    pub fn is_ok(&self) -> bool {
        self.ast.is_some() && self.errors.is_empty()
    }
}

/// Options for [`ExpressionEngine::analyze`]
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// External `%` variables known to the caller
    pub variables: Vec<String>,
    /// Type of the evaluation input, if known
    pub input_type: Option<String>,
    /// Return a partial tree for text that fails to parse
    pub error_recovery: bool,
}

/// What an [`EngineFinding`] reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// The text does not parse
    Syntax,
    /// A `%` or `$` variable nothing defines
    UnknownVariable,
}

/// One problem reported by [`ExpressionEngine::analyze`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFinding {
    pub kind: FindingKind,
    pub error: SyntaxError,
}

impl EngineFinding {
    pub fn syntax(error: SyntaxError) -> Self {
        Self {
            kind: FindingKind::Syntax,
            error,
        }
    }

    pub fn unknown_variable(error: SyntaxError) -> Self {
        Self {
            kind: FindingKind::UnknownVariable,
            error,
        }
    }
}

/// Result of analyzing one expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutcome {
    /// Parsed tree, possibly partial when recovery was requested
    pub ast: Option<Arc<ExpressionNode>>,
    /// Syntax errors and semantic findings, which may accompany a partial tree
    pub diagnostics: Vec<EngineFinding>,
}

/// Parser and analyzer consumed by completion, diagnostics and indexing
#[async_trait]
pub trait ExpressionEngine: Send + Sync + fmt::Debug {
    /// Parse an expression into a tree or syntax errors
    async fn parse(&self, text: &str) -> Result<ParseOutcome, EngineError>;

    /// Parse and check an expression against the given options
    async fn analyze(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisOutcome, EngineError>;
}

/// `%` variables every FHIRPath environment defines
pub const BUILTIN_EXTERNAL_VARIABLES: &[&str] = &[
    "resource",
    "rootResource",
    "context",
    "ucum",
    "sct",
    "loinc",
    "terminologies",
    "factory",
    "server",
];

/// `$` variables bound by the evaluator
pub const BUILTIN_ITERATION_VARIABLES: &[&str] = &["this", "index", "total"];

/// Bundled expression engine with memoized parsing
pub struct PathExpressionEngine {
    cache: ResultCache<String, ParseOutcome>,
}

impl PathExpressionEngine {
    /// Create an engine whose parse cache uses `config`
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ResultCache::new("expressions", config),
        }
    }

    /// Parse without going through the cache
    pub fn parse_uncached(text: &str) -> ParseOutcome {
        match parse_expression(text) {
            Ok(ast) => ParseOutcome {
                ast: Some(Arc::new(ast)),
                errors: Vec::new(),
            },
            Err(error) => ParseOutcome {
                ast: None,
                errors: vec![error],
            },
        }
    }

    /// Parse cache statistics
    pub fn cache(&self) -> &ResultCache<String, ParseOutcome> {
        &self.cache
    }

    fn parse_cached(&self, text: &str) -> ParseOutcome {
        if let Some(outcome) = self.cache.get(text) {
            return outcome;
        }
        let outcome = Self::parse_uncached(text);
        debug!(
            "parsed '{}' with {} error(s)",
            text,
            outcome.errors.len()
        );
        self.cache.set(text.to_string(), outcome.clone());
        outcome
    }

    /// Parse the longest prefix before the first error that still forms an expression
    fn recover(text: &str, error: &SyntaxError) -> Option<Arc<ExpressionNode>> {
        let mut cut = error.position.min(text.len());
        while cut > 0 {
            let prefix = text.get(..cut)?.trim_end();
            let prefix = prefix.trim_end_matches(['.', '(', '[', ',']).trim_end();
            if prefix.is_empty() {
                return None;
            }
            if let Ok(ast) = parse_expression(prefix) {
                return Some(Arc::new(ast));
            }
            cut = prefix.len().saturating_sub(1);
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
        }
        None
    }
}

impl Default for PathExpressionEngine {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for PathExpressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathExpressionEngine")
            .field("cache", &self.cache)
            .finish()
    }
}

struct VariableChecker<'a> {
    known: &'a [String],
    findings: Vec<SyntaxError>,
}

impl Visitor for VariableChecker<'_> {
    fn visit(&mut self, node: &ExpressionNode) {
        if let ExpressionKind::Variable { name, sigil } = &node.kind {
            let known = match sigil {
                '$' => BUILTIN_ITERATION_VARIABLES.contains(&name.as_str()),
                _ => {
                    BUILTIN_EXTERNAL_VARIABLES.contains(&name.as_str())
                        || name.starts_with("vs-")
                        || name.starts_with("ext-")
                        || self.known.iter().any(|v| v == name)
                }
            };
            if !known {
                self.findings.push(SyntaxError::new(
                    format!("Unknown variable '{sigil}{name}'"),
                    node.span.start,
                    node.span.len(),
                ));
            }
        }
        walk(self, node);
    }
}

/// Names bound by `defineVariable('name', ...)` anywhere in the tree
pub fn defined_variables(node: &ExpressionNode) -> Vec<String> {
    struct Collector(Vec<String>);

    impl Visitor for Collector {
        fn visit(&mut self, node: &ExpressionNode) {
            let (name, args) = match &node.kind {
                ExpressionKind::MethodCall { name, args, .. }
                | ExpressionKind::FunctionCall { name, args } => (name, args),
                _ => return walk(self, node),
            };
            if name == "defineVariable" {
                if let Some(ExpressionNode {
                    kind: ExpressionKind::Literal(crate::ast::LiteralValue::String(var)),
                    ..
                }) = args.first()
                {
                    self.0.push(var.clone());
                }
            }
            walk(self, node);
        }
    }

    let mut collector = Collector(Vec::new());
    collector.visit(node);
    collector.0
}

#[async_trait]
impl ExpressionEngine for PathExpressionEngine {
    async fn parse(&self, text: &str) -> Result<ParseOutcome, EngineError> {
        Ok(self.parse_cached(text))
    }

    async fn analyze(
        &self,
        text: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisOutcome, EngineError> {
        let outcome = self.parse_cached(text);
        let mut diagnostics: Vec<EngineFinding> = outcome
            .errors
            .iter()
            .cloned()
            .map(EngineFinding::syntax)
            .collect();

        let ast = match (&outcome.ast, outcome.errors.first()) {
            (Some(ast), _) => Some(Arc::clone(ast)),
            (None, Some(error)) if options.error_recovery => Self::recover(text, error),
            _ => None,
        };

        if let Some(ast) = &ast {
            let mut known = options.variables.clone();
            known.extend(defined_variables(ast));
            let mut checker = VariableChecker {
                known: &known,
                findings: Vec::new(),
            };
            checker.visit(ast);
            diagnostics.extend(checker.findings.into_iter().map(EngineFinding::unknown_variable));
        }

        Ok(AnalysisOutcome { ast, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ChainStep;

    #[tokio::test]
    async fn test_parse_success_is_cached() {
        let engine = PathExpressionEngine::default();
        let first = engine.parse("Patient.name").await.unwrap();
        assert!(first.is_ok());
        let second = engine.parse("Patient.name").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_parse_failure_reports_errors() {
        let engine = PathExpressionEngine::default();
        let outcome = engine.parse("Patient.name.where(").await.unwrap();
        assert!(outcome.ast.is_none());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_recovers_partial_tree() {
        let engine = PathExpressionEngine::default();
        let options = AnalyzeOptions {
            error_recovery: true,
            ..Default::default()
        };
        let outcome = engine.analyze("Patient.name.", &options).await.unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, FindingKind::Syntax);
        let ast = outcome.ast.expect("partial tree");
        let chain = ast.chain();
        assert_eq!(chain.root_identifier(), Some("Patient"));
        assert!(matches!(chain.steps[0], ChainStep::Member { name: "name", .. }));
    }

    #[tokio::test]
    async fn test_analyze_flags_unknown_variables() {
        let engine = PathExpressionEngine::default();
        let options = AnalyzeOptions {
            variables: vec!["threshold".to_string()],
            ..Default::default()
        };
        let outcome = engine
            .analyze("%resource.id = %threshold or %missing.exists()", &options)
            .await
            .unwrap();
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, FindingKind::UnknownVariable);
        assert_eq!(outcome.diagnostics[0].error.message, "Unknown variable '%missing'");
    }

    #[tokio::test]
    async fn test_define_variable_binds_name() {
        let engine = PathExpressionEngine::default();
        let outcome = engine
            .analyze(
                "defineVariable('n', name).select(%n.given)",
                &AnalyzeOptions::default(),
            )
            .await
            .unwrap();
        assert!(outcome.diagnostics.is_empty());
    }
}
