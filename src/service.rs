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

//! Editor-facing entry point
//!
//! [`IntellisenseService`] owns one instance of every component and cache.
//! Nothing is global, so two services never share state.

use crate::analyzer::{DocumentDirectives, InputFileTypes, analyze_document};
use crate::completion::{CompletionCandidate, CompletionRequest, CompletionSynthesizer};
use crate::config::Config;
use crate::diagnostics::{Diagnostic, DiagnosticValidator, ExtraValidator};
use crate::error::Result;
use crate::model::TypeProvider;
use crate::navigator::TypeNavigator;
use crate::parser::{ExpressionEngine, PathExpressionEngine};
use crate::symbols::{
    CancellationFlag, DocumentSymbolExtractor, IndexReport, SearchOptions, SearchResult,
    SymbolIndex, WorkspaceIndexer,
};
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// Completion, diagnostics and workspace search over one schema
#[derive(Debug)]
pub struct IntellisenseService {
    config: Config,
    navigator: Arc<TypeNavigator>,
    completions: CompletionSynthesizer,
    validator: DiagnosticValidator,
    input_files: Arc<InputFileTypes>,
    extractor: Arc<DocumentSymbolExtractor>,
    index: Arc<SymbolIndex>,
    indexer: WorkspaceIndexer,
}

impl IntellisenseService {
    /// Create a service using the bundled expression engine
    pub fn new(provider: Arc<dyn TypeProvider>, config: Config) -> Self {
        let engine = Arc::new(PathExpressionEngine::new(config.cache.expressions.clone()));
        Self::with_engine(provider, engine, config)
    }

    /// Create a service around a caller-supplied expression engine
    pub fn with_engine(
        provider: Arc<dyn TypeProvider>,
        engine: Arc<dyn ExpressionEngine>,
        config: Config,
    ) -> Self {
        let navigator = Arc::new(TypeNavigator::new(provider, config.cache.types.clone()));
        let completions = CompletionSynthesizer::new(
            Arc::clone(&navigator),
            config.completion.clone(),
            config.cache.completions.clone(),
        );
        let input_files = Arc::new(InputFileTypes::new(config.cache.input_files.clone()));
        let validator = DiagnosticValidator::new(Arc::clone(&engine), Arc::clone(&navigator))
            .with_input_files(Arc::clone(&input_files));
        let extractor = Arc::new(DocumentSymbolExtractor::new(engine));
        let index = Arc::new(SymbolIndex::new(config.cache.search.clone()));
        let indexer = WorkspaceIndexer::new(
            Arc::clone(&index),
            Arc::clone(&extractor),
            config.index.clone(),
        );

        Self {
            config,
            navigator,
            completions,
            validator,
            input_files,
            extractor,
            index,
            indexer,
        }
    }

    /// Append a validator run after the built-in checks
    pub fn with_extra_validator(mut self, validator: Arc<dyn ExtraValidator>) -> Self {
        self.validator = self.validator.with_extra_validator(validator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<TypeNavigator> {
        &self.navigator
    }

    pub fn completions(&self) -> &CompletionSynthesizer {
        &self.completions
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    /// Ranked completions at a byte offset of a document
    pub async fn complete(&self, text: &str, offset: usize) -> Vec<CompletionCandidate> {
        self.complete_with(text, offset, None, None).await
    }

    /// Like [`Self::complete`], with the trigger character and the directory
    /// the document lives in, which resolves `@inputfile` and lists JSON files
    pub async fn complete_with(
        &self,
        text: &str,
        offset: usize,
        trigger_char: Option<char>,
        document_dir: Option<&Path>,
    ) -> Vec<CompletionCandidate> {
        let context = analyze_document(text, offset, trigger_char);
        let context_type = self.document_context_type(text, document_dir).await;
        debug!(
            "completing '{}' at {offset} (context type {context_type:?})",
            context.token()
        );
        self.completions
            .complete(CompletionRequest {
                context: &context,
                context_type: context_type.as_deref(),
                document_dir,
            })
            .await
    }

    /// Diagnostics for a whole document
    pub async fn diagnose(&self, text: &str) -> Vec<Diagnostic> {
        self.validator.validate_document(text, None).await
    }

    /// Like [`Self::diagnose`], resolving `@inputfile` against `document_dir`
    pub async fn diagnose_in(&self, text: &str, document_dir: &Path) -> Vec<Diagnostic> {
        self.validator.validate_document(text, Some(document_dir)).await
    }

    /// Search workspace symbols, with the configured defaults when `options` is `None`
    pub fn search(&self, query: &str, options: Option<&SearchOptions>) -> Arc<Vec<SearchResult>> {
        self.index
            .search(query, options.unwrap_or(&self.config.search))
    }

    /// Reindex one open or changed document, returning its symbol count
    pub async fn update_file(&self, uri: &str, text: &str) -> Result<usize> {
        let symbols = self.extractor.extract(uri, text).await?;
        let count = symbols.len();
        self.index.update_file(uri, symbols);
        Ok(count)
    }

    pub fn remove_file(&self, uri: &str) {
        self.index.remove_file(uri);
    }

    /// Index every matching file under `root` on the worker pool
    pub async fn index_workspace(&self, root: &Path, cancel: &CancellationFlag) -> IndexReport {
        self.indexer.index_workspace(root, cancel).await
    }

    /// Index `root` without spawning workers
    pub async fn index_workspace_sync(&self, root: &Path) -> IndexReport {
        self.indexer.index_sync(root).await
    }

    /// Record that the user accepted a completion
    pub fn record_completion_used(&self, label: &str) {
        self.completions.record_usage(label);
    }

    /// Drop memoized schema lookups, completion lists and input file types
    pub fn clear_caches(&self) {
        self.navigator.clear_caches();
        self.completions.cache().clear();
        self.input_files.clear();
    }

    pub fn input_files(&self) -> &Arc<InputFileTypes> {
        &self.input_files
    }

    async fn document_context_type(&self, text: &str, document_dir: Option<&Path>) -> Option<String> {
        let directives = DocumentDirectives::parse(text);
        if let Some(context_type) = directives.context_type() {
            return Some(context_type);
        }
        self.input_files
            .resource_type(&directives, document_dir?)
            .await
            .inspect_err(|err| debug!("ignoring @inputfile: {err}"))
            .ok()
            .flatten()
    }
}
