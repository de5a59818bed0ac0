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

//! Document validation against the schema
//!
//! Each `;`-separated statement is checked on its own, so a statement that
//! fails to parse never hides problems in its neighbours.

use super::chains::{ChainJob, JobStep, Scope, collect_chains};
use super::diagnostic::{Diagnostic, DiagnosticCode, QuickFix};
use crate::analyzer::{
    DocumentDirectives, InputFileTypes, TYPE_PRESERVING_FUNCTIONS, lines_with_offsets,
    split_statements,
};
use crate::ast::ExpressionNode;
use crate::navigator::{NavigationResult, TypeNavigator, closest_match, is_choice_property};
use crate::parser::span::Span;
use crate::parser::{AnalyzeOptions, ExpressionEngine, FindingKind, SyntaxError};
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Additional checks run after the built-in ones on every parsed statement
///
/// Ranges are relative to `text`.
#[async_trait]
pub trait ExtraValidator: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn validate(
        &self,
        ast: &ExpressionNode,
        text: &str,
        context_type: Option<&str>,
    ) -> Vec<Diagnostic>;
}

/// A statement located in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSpan {
    pub text: String,
    /// Byte offset of the statement in the document
    pub offset: usize,
}

/// Statements of a document, comment lines excluded
pub fn expression_spans(document: &str) -> Vec<ExpressionSpan> {
    lines_with_offsets(document)
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .flat_map(|(line_start, line)| {
            split_statements(line)
                .into_iter()
                .map(move |statement| ExpressionSpan {
                    text: statement.text,
                    offset: line_start + statement.start_col,
                })
        })
        .collect()
}

/// Validates documents through the expression engine and the navigator
#[derive(Debug)]
pub struct DiagnosticValidator {
    engine: Arc<dyn ExpressionEngine>,
    navigator: Arc<TypeNavigator>,
    input_files: Arc<InputFileTypes>,
    extra_validators: Vec<Arc<dyn ExtraValidator>>,
}

impl DiagnosticValidator {
    pub fn new(engine: Arc<dyn ExpressionEngine>, navigator: Arc<TypeNavigator>) -> Self {
        Self {
            engine,
            navigator,
            input_files: Arc::new(InputFileTypes::default()),
            extra_validators: Vec::new(),
        }
    }

    /// Share an `@inputfile` cache with other components
    pub fn with_input_files(mut self, input_files: Arc<InputFileTypes>) -> Self {
        self.input_files = input_files;
        self
    }

    /// Append an extra validator
    pub fn with_extra_validator(mut self, validator: Arc<dyn ExtraValidator>) -> Self {
        self.extra_validators.push(validator);
        self
    }

    /// Diagnostics for a whole document, sorted by position
    ///
    /// `base_dir` resolves `@inputfile`; without it the file is not read.
    pub async fn validate_document(&self, document: &str, base_dir: Option<&Path>) -> Vec<Diagnostic> {
        let directives = DocumentDirectives::parse(document);
        let mut diagnostics: Vec<Diagnostic> = directives
            .issues
            .iter()
            .map(|issue| Diagnostic::warning(DiagnosticCode::InvalidDirective, issue.span, &issue.message))
            .collect();

        let context_type = self
            .document_context_type(&directives, base_dir, &mut diagnostics)
            .await;

        let spans = expression_spans(document);
        let results = join_all(spans.iter().map(|span| {
            let context_type = context_type.as_deref();
            async move {
                self.validate_expression(&span.text, context_type)
                    .await
                    .into_iter()
                    .map(|d| d.offset(span.offset))
                    .collect::<Vec<_>>()
            }
        }))
        .await;
        diagnostics.extend(results.into_iter().flatten());

        diagnostics.sort_by_key(|d| (d.range.start, d.range.end));
        debug!("validated {} statements, {} diagnostics", spans.len(), diagnostics.len());
        diagnostics
    }

    async fn document_context_type(
        &self,
        directives: &DocumentDirectives,
        base_dir: Option<&Path>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<String> {
        let mut context_type = directives.context_type();

        if context_type.is_none()
            && let (Some(base), Some(directive)) = (base_dir, directives.input_file.as_ref())
        {
            match self.input_files.resource_type(directives, base).await {
                Ok(found) => context_type = found,
                Err(err) => diagnostics.push(Diagnostic::warning(
                    DiagnosticCode::InvalidDirective,
                    directive.span,
                    format!("Cannot read @inputfile: {err}"),
                )),
            }
        }

        if let (Some(name), Some(directive)) = (&context_type, directives.resource.as_ref())
            && self.navigator.get_enhanced_type(name).await.is_none()
            && !self.navigator.all_resource_types().await.is_empty()
        {
            let mut diagnostic = Diagnostic::warning(
                DiagnosticCode::InvalidDirective,
                directive.span,
                format!("Unknown resource type '{name}' in @resource"),
            );
            if let Some(suggestion) = self.suggest_resource_type(name).await {
                diagnostic = diagnostic.with_quick_fix(QuickFix::replace(directive.span, suggestion));
            }
            diagnostics.push(diagnostic);
        }

        context_type
    }

    /// Diagnostics for one statement, ranges relative to `text`
    pub async fn validate_expression(&self, text: &str, context_type: Option<&str>) -> Vec<Diagnostic> {
        let options = AnalyzeOptions {
            input_type: context_type.map(str::to_string),
            ..Default::default()
        };
        let analysis = match self.engine.analyze(text, &options).await {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!("expression engine failed on '{text}': {err}");
                return Vec::new();
            }
        };

        let mut diagnostics: Vec<Diagnostic> = analysis
            .diagnostics
            .iter()
            .map(|finding| match finding.kind {
                FindingKind::Syntax => syntax_diagnostic(&finding.error, text.len()),
                FindingKind::UnknownVariable => Diagnostic::warning(
                    DiagnosticCode::UnknownVariable,
                    clamp(finding.error.position, finding.error.length, text.len()),
                    &finding.error.message,
                ),
            })
            .collect();

        let Some(ast) = analysis.ast else {
            return diagnostics;
        };

        let scope = context_type.map(Scope::new);
        for job in collect_chains(&ast, scope.as_ref()) {
            self.validate_chain(&job, &mut diagnostics).await;
        }

        for validator in &self.extra_validators {
            let extra = validator.validate(&ast, text, context_type).await;
            debug!("{} added {} diagnostics", validator.name(), extra.len());
            diagnostics.extend(extra);
        }

        diagnostics
    }

    async fn validate_chain(&self, job: &ChainJob, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(root_span) = job.type_root_span
            && self.navigator.get_enhanced_type(&job.root_type).await.is_none()
        {
            self.report_unknown_type(&job.root_type, root_span, diagnostics)
                .await;
            return;
        }

        let mut segments = job.base_path.clone();
        let base = self.navigator.resolve_path(&job.root_type, &segments).await;
        let Some(mut current) = base.final_type.clone().filter(|_| base.is_valid) else {
            // The enclosing chain reports its own failure
            return;
        };

        // (declaring type, element, span) of the last member step
        let mut last_member: Option<(String, String, Span)> = None;

        for step in &job.steps {
            match step {
                JobStep::Member { name, span } => {
                    segments.push(name.clone());
                    let result = self.navigator.resolve_path(&job.root_type, &segments).await;
                    let Some(next) = result.final_type.clone().filter(|_| result.is_valid) else {
                        diagnostics.push(self.segment_error(current.name(), name, *span, &result).await);
                        return;
                    };
                    last_member = Some((current.name().to_string(), name.clone(), *span));
                    current = next;
                }
                JobStep::Index { span } => {
                    if let Some((owner, element, element_span)) = last_member.take()
                        && let Some(constraints) =
                            self.navigator.element_constraints(&owner, &element).await
                        && !constraints.is_collection()
                    {
                        diagnostics.push(Diagnostic::warning(
                            DiagnosticCode::CardinalityMismatch,
                            element_span.merge(*span),
                            format!(
                                "Indexer on '{element}' which holds at most one value ({})",
                                constraints.cardinality()
                            ),
                        ));
                    }
                }
                JobStep::Call {
                    name,
                    span,
                    has_args,
                } => {
                    if matches!(name.as_str(), "exists" | "empty")
                        && !has_args
                        && let Some((owner, element, element_span)) = last_member.as_ref()
                        && let Some(constraints) =
                            self.navigator.element_constraints(owner, element).await
                        && constraints.required
                        && constraints.max == Some(1)
                    {
                        let outcome = if name == "exists" { "true" } else { "false" };
                        diagnostics.push(Diagnostic::warning(
                            DiagnosticCode::RequiredElement,
                            element_span.merge(*span),
                            format!(
                                "'{element}' is required ({}), so {name}() is always {outcome}",
                                constraints.cardinality()
                            ),
                        ));
                    }
                    last_member = None;
                    if !TYPE_PRESERVING_FUNCTIONS.contains(&name.as_str()) {
                        return;
                    }
                }
            }
        }
    }

    async fn segment_error(
        &self,
        owner: &str,
        name: &str,
        span: Span,
        result: &NavigationResult,
    ) -> Diagnostic {
        if is_choice_property(name) {
            let choice = self.navigator.validate_choice_property(owner, name).await;
            if let Some(base) = choice.base_property.as_ref().filter(|_| !choice.is_valid) {
                let mut diagnostic = Diagnostic::error(
                    DiagnosticCode::InvalidChoiceProperty,
                    span,
                    format!(
                        "'{name}' is not a valid choice for '{base}[x]' on type '{owner}'. Valid choices: {}",
                        choice.valid_choices.join(", ")
                    ),
                );
                if let Some(suggested) = &choice.suggested_property {
                    diagnostic = diagnostic.with_quick_fix(QuickFix::replace(span, suggested));
                }
                return diagnostic;
            }
        }

        let mut diagnostic = Diagnostic::error(
            DiagnosticCode::PropertyNotFound,
            span,
            format!(
                "Property '{name}' not found on type '{owner}'. Available properties: {}",
                result.available_properties.join(", ")
            ),
        );
        if let Some(suggestion) = &result.suggestion {
            diagnostic = diagnostic.with_quick_fix(QuickFix::replace(span, suggestion));
        }
        diagnostic
    }

    async fn report_unknown_type(&self, name: &str, span: Span, diagnostics: &mut Vec<Diagnostic>) {
        if self.navigator.all_resource_types().await.is_empty() {
            // Nothing to compare against
            return;
        }
        let mut diagnostic = Diagnostic::error(
            DiagnosticCode::UnknownResourceType,
            span,
            format!("Unknown resource type '{name}'"),
        );
        if let Some(suggestion) = self.suggest_resource_type(name).await {
            diagnostic = diagnostic.with_quick_fix(QuickFix::replace(span, suggestion));
        }
        diagnostics.push(diagnostic);
    }

    async fn suggest_resource_type(&self, name: &str) -> Option<String> {
        let known = self.navigator.all_resource_types().await;
        closest_match(name, known.iter().map(String::as_str))
    }
}

fn clamp(position: usize, length: usize, text_len: usize) -> Span {
    let end = (position + length.max(1)).min(text_len);
    Span::new(position.min(end), end)
}

fn syntax_diagnostic(error: &SyntaxError, text_len: usize) -> Diagnostic {
    Diagnostic::error(
        DiagnosticCode::SyntaxError,
        clamp(error.position, error.length, text_len),
        &error.message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::diagnostics::Severity;
    use crate::model::{EmptyTypeProvider, InMemoryTypeProvider};
    use crate::error::EngineError;
    use crate::parser::{AnalysisOutcome, ParseOutcome, PathExpressionEngine};
    use pretty_assertions::assert_eq;

    fn validator() -> DiagnosticValidator {
        let navigator = Arc::new(TypeNavigator::new(
            Arc::new(InMemoryTypeProvider::fhir_r4_core()),
            CacheConfig::default(),
        ));
        DiagnosticValidator::new(Arc::new(PathExpressionEngine::default()), navigator)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    /// Engine that always returns a partial tree alongside syntax errors
    #[derive(Debug, Default)]
    struct RecoveringEngine(PathExpressionEngine);

    #[async_trait]
    impl ExpressionEngine for RecoveringEngine {
        async fn parse(&self, text: &str) -> Result<ParseOutcome, EngineError> {
            self.0.parse(text).await
        }

        async fn analyze(
            &self,
            text: &str,
            options: &AnalyzeOptions,
        ) -> Result<AnalysisOutcome, EngineError> {
            let options = AnalyzeOptions {
                error_recovery: true,
                ..options.clone()
            };
            self.0.analyze(text, &options).await
        }
    }

    #[test]
    fn test_expression_spans_skip_comments() {
        let spans = expression_spans("// @resource Patient\nname; gender\n\n  active");
        let texts: Vec<_> = spans.iter().map(|s| (s.text.as_str(), s.offset)).collect();
        assert_eq!(texts, vec![("name", 21), ("gender", 27), ("active", 37)]);
    }

    #[tokio::test]
    async fn test_partial_tree_keeps_syntax_errors() {
        let navigator = Arc::new(TypeNavigator::new(
            Arc::new(InMemoryTypeProvider::fhir_r4_core()),
            CacheConfig::default(),
        ));
        let validator = DiagnosticValidator::new(Arc::new(RecoveringEngine::default()), navigator);

        let diagnostics = validator.validate_expression("Patient.nme.", None).await;
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::SyntaxError, DiagnosticCode::PropertyNotFound]
        );
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_deep_nesting_is_a_syntax_error() {
        let text = format!("{}Patient{}", "(".repeat(2000), ")".repeat(2000));
        let diagnostics = validator().validate_expression(&text, None).await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::SyntaxError]);
        assert!(diagnostics[0].message.contains("nested too deeply"));
    }

    #[tokio::test]
    async fn test_valid_document_has_no_diagnostics() {
        let document = "Patient.name.given\nObservation.valueQuantity.unit\nPatient.name.where(family.exists()).given";
        assert_eq!(validator().validate_document(document, None).await, Vec::new());
    }

    #[tokio::test]
    async fn test_property_not_found_with_quick_fix() {
        let document = "Patient.nme";
        let diagnostics = validator().validate_document(document, None).await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::PropertyNotFound]);
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.range, Span::new(8, 11));
        assert!(diagnostic.message.contains("'nme'"));
        assert!(diagnostic.message.contains("'Patient'"));
        assert!(diagnostic.message.contains("birthDate"));
        assert_eq!(diagnostic.quick_fix.as_ref().unwrap().replacement, "name");
    }

    #[tokio::test]
    async fn test_invalid_choice_property() {
        let diagnostics = validator()
            .validate_document("Observation.valueIntger", None)
            .await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::InvalidChoiceProperty]);
        assert!(diagnostics[0].message.contains("valueQuantity"));
        assert_eq!(
            diagnostics[0].quick_fix.as_ref().unwrap().replacement,
            "valueInteger"
        );
    }

    #[tokio::test]
    async fn test_syntax_errors_are_isolated_per_statement() {
        let document = "Patient.name.; Patient.nme\nPatient.gender";
        let diagnostics = validator().validate_document(document, None).await;
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::SyntaxError, DiagnosticCode::PropertyNotFound]
        );
        assert_eq!(diagnostics[1].range, Span::new(23, 26));
    }

    #[tokio::test]
    async fn test_context_type_from_directive() {
        let document = "// @resource Patient\nname.famly";
        let diagnostics = validator().validate_document(document, None).await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::PropertyNotFound]);
        assert!(diagnostics[0].message.contains("'HumanName'"));
        assert_eq!(diagnostics[0].quick_fix.as_ref().unwrap().replacement, "family");
    }

    #[tokio::test]
    async fn test_iterating_function_arguments_validated() {
        let diagnostics = validator()
            .validate_document("Patient.name.where(famly = 'x')", None)
            .await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::PropertyNotFound]);
        assert_eq!(diagnostics[0].range, Span::new(19, 24));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let diagnostics = validator().validate_document("Patiant.name", None).await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::UnknownResourceType]);
        assert_eq!(diagnostics[0].quick_fix.as_ref().unwrap().replacement, "Patient");
    }

    #[tokio::test]
    async fn test_cardinality_and_required_warnings() {
        let diagnostics = validator()
            .validate_document("Patient.gender[0]; Observation.status.exists(); Patient.name[0]", None)
            .await;
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::CardinalityMismatch, DiagnosticCode::RequiredElement]
        );
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));
        assert!(diagnostics[1].message.contains("always true"));
    }

    #[tokio::test]
    async fn test_directive_issues_reported() {
        let document = "// @resorce Patient\n// @input {bad\nPatient.name";
        let diagnostics = validator().validate_document(document, None).await;
        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::InvalidDirective, DiagnosticCode::InvalidDirective]
        );
    }

    #[tokio::test]
    async fn test_unknown_variable_warning() {
        let diagnostics = validator().validate_document("%nope.name", None).await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::UnknownVariable]);
    }

    #[tokio::test]
    async fn test_unavailable_provider_reports_only_syntax() {
        let navigator = Arc::new(TypeNavigator::new(Arc::new(EmptyTypeProvider), CacheConfig::default()));
        let validator = DiagnosticValidator::new(Arc::new(PathExpressionEngine::default()), navigator);
        let diagnostics = validator
            .validate_document("Patient.nme\nPatient.(", None)
            .await;
        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::SyntaxError]);
    }

    #[derive(Debug)]
    struct NoWhere;

    #[async_trait]
    impl ExtraValidator for NoWhere {
        fn name(&self) -> &str {
            "no-where"
        }

        async fn validate(
            &self,
            _ast: &ExpressionNode,
            text: &str,
            _context_type: Option<&str>,
        ) -> Vec<Diagnostic> {
            text.find("where")
                .map(|at| {
                    Diagnostic::info(
                        DiagnosticCode::SyntaxError,
                        Span::new(at, at + 5),
                        "where() is discouraged here",
                    )
                })
                .into_iter()
                .collect()
        }
    }

    #[tokio::test]
    async fn test_extra_validators_run_after_core_checks() {
        let validator = validator().with_extra_validator(Arc::new(NoWhere));
        let diagnostics = validator
            .validate_document("Patient.name\nPatient.name.where(use = 'x')", None)
            .await;
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, Span::new(26, 31));
        assert_eq!(diagnostics[0].severity, Severity::Info);
    }
}
