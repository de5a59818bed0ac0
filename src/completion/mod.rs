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

//! Completion synthesis
//!
//! Combines the cursor context with schema navigation into a ranked,
//! filtered and capped candidate list. Candidate groups:
//! - direct properties of the navigated type
//! - concrete names of its choice elements (`valueQuantity`)
//! - properties inherited from ancestor types
//! - language completions from [`LanguageRegistry`]

pub mod candidate;
pub mod directive;
pub mod ranking;
pub mod registry;
pub mod usage;

pub use candidate::{CandidateMetadata, CompletionCandidate, CompletionKind};
pub use directive::{directive_candidates, json_file_candidates};
pub use ranking::{
    FilterContext, RankingCriteria, apply_semantic_filters, calculate_score, filter_by_token,
    rank_completions,
};
pub use registry::{FunctionEntry, LanguageRegistry};
pub use usage::UsageTracker;

use crate::analyzer::{ExpressionContext, NavigationContext};
use crate::cache::{CacheConfig, ResultCache};
use crate::config::CompletionConfig;
use crate::model::TypeInfo;
use crate::navigator::{Constraints, TypeNavigator, get_choice_property_names, resolve_choice_types};
use log::debug;
use std::path::Path;
use std::sync::Arc;

/// Input of one completion request
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Classified cursor position
    pub context: &'a ExpressionContext,
    /// Type expressions are evaluated against, from directives
    pub context_type: Option<&'a str>,
    /// Directory of the document, for `@inputfile` completion
    pub document_dir: Option<&'a Path>,
}

/// Cache key of a completion list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompletionKey {
    context_type: Option<String>,
    parent_expression: Option<String>,
    enclosing_base: Option<String>,
    token: String,
    trigger_char: Option<char>,
    is_after_dot: bool,
    is_in_brackets: bool,
    has_previous_token: bool,
}

impl CompletionKey {
    fn new(request: &CompletionRequest<'_>) -> Self {
        let context = request.context;
        Self {
            context_type: request.context_type.map(str::to_string),
            parent_expression: context.parent_expression.clone(),
            enclosing_base: context
                .enclosing_function
                .as_ref()
                .map(|f| format!("{}({})", f.name, f.base.as_deref().unwrap_or_default())),
            token: context.token().to_string(),
            trigger_char: context.trigger_char,
            is_after_dot: context.is_after_dot,
            is_in_brackets: context.is_in_brackets,
            has_previous_token: context.previous_token.is_some(),
        }
    }
}

/// Builds ranked completion lists
#[derive(Debug)]
pub struct CompletionSynthesizer {
    navigator: Arc<TypeNavigator>,
    registry: LanguageRegistry,
    config: CompletionConfig,
    file_depth: usize,
    usage: UsageTracker,
    cache: ResultCache<CompletionKey, Arc<Vec<CompletionCandidate>>>,
}

impl CompletionSynthesizer {
    pub fn new(navigator: Arc<TypeNavigator>, config: CompletionConfig, cache: CacheConfig) -> Self {
        Self {
            navigator,
            registry: LanguageRegistry::fhirpath(),
            usage: UsageTracker::new(config.usage_table_limit),
            config,
            file_depth: 3,
            cache: ResultCache::new("completions", cache),
        }
    }

    /// Use another language table
    pub fn with_registry(mut self, registry: LanguageRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Directory depth searched for `@inputfile` candidates
    pub fn with_file_depth(mut self, depth: usize) -> Self {
        self.file_depth = depth;
        self
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn cache(&self) -> &ResultCache<CompletionKey, Arc<Vec<CompletionCandidate>>> {
        &self.cache
    }

    /// Count a candidate the user actually accepted
    ///
    /// Cached lists embed usage-based scores, so they are dropped when
    /// weighting is enabled.
    pub fn record_usage(&self, label: &str) {
        self.usage.record(label);
        if self.config.priority_weighting.is_some() {
            self.cache.clear();
        }
    }

    /// Ranked candidates for a request
    pub async fn complete(&self, request: CompletionRequest<'_>) -> Vec<CompletionCandidate> {
        let context = request.context;

        if let Some(directive) = context.directive.as_ref().filter(|_| context.is_in_directive) {
            let candidates = directive_candidates(
                directive,
                &self.navigator,
                request.document_dir,
                self.file_depth,
            )
            .await;
            return self.finish(candidates, &directive.current_token, None);
        }

        let key = CompletionKey::new(&request);
        if let Some(cached) = self.cache.get(&key) {
            debug!("completion cache hit for '{}'", key.token);
            return cached.as_ref().clone();
        }

        let resource_types = self.navigator.all_resource_types().await;
        let navigation = NavigationContext::from_expression_context(
            context,
            request.context_type,
            |name| resource_types.iter().any(|r| r == name),
        );

        let mut candidates = Vec::new();
        let mut target_is_collection = None;

        if let Some(NavigationContext {
            resource_type: Some(root),
            property_path,
            ..
        }) = &navigation
        {
            let result = self.navigator.resolve_path(root, property_path).await;
            if let Some(final_type) = result.final_type.as_ref().filter(|_| result.is_valid) {
                candidates.extend(self.property_candidates(final_type).await);
                target_is_collection = self
                    .path_is_collection(&result.navigation_path, property_path)
                    .await;
            } else {
                debug!("no completion target for {root}.{}", property_path.join("."));
            }
        }

        if context.is_after_dot {
            if navigation.is_none() && context.parent_expression.is_none() {
                return Vec::new();
            }
        } else {
            candidates.extend(resource_types.iter().map(|name| {
                CompletionCandidate::new(name.as_str(), CompletionKind::ResourceType)
                    .with_detail("resource type")
            }));
            candidates.extend(self.registry.operator_candidates());
            candidates.extend(self.registry.keyword_candidates());
            candidates.extend(self.registry.literal_candidates());
            candidates.extend(self.registry.variable_candidates());
        }
        candidates.extend(self.registry.function_candidates());
        candidates.extend(self.registry.snippet_candidates());

        let filter_context = FilterContext {
            token: context.token(),
            is_after_dot: context.is_after_dot,
            is_in_brackets: context.is_in_brackets,
            has_previous_token: context.previous_token.is_some(),
            target_is_collection,
        };
        let candidates = apply_semantic_filters(
            candidates,
            &filter_context,
            &self.config.semantic_filtering,
            &self.registry,
        );

        let ranked = self.finish(candidates, context.token(), Some(key.clone()));
        debug!(
            "completion for '{}' produced {} candidates",
            context.text,
            ranked.len()
        );
        ranked
    }

    /// Token filter, rank, documentation policy and caching
    fn finish(
        &self,
        candidates: Vec<CompletionCandidate>,
        token: &str,
        key: Option<CompletionKey>,
    ) -> Vec<CompletionCandidate> {
        let candidates = dedup_by_label(candidates);
        let (candidates, filtered) = filter_by_token(candidates, token, self.config.fuzzy_matching);
        let criteria = RankingCriteria::from_config(&self.config, filtered);
        let mut ranked = rank_completions(candidates, token, &criteria, &self.usage);

        if !self.config.include_documentation {
            for candidate in &mut ranked {
                candidate.documentation = None;
            }
        }

        if let Some(key) = key {
            self.cache.set(key, Arc::new(ranked.clone()));
        }
        ranked
    }

    /// Direct, choice-expanded and inherited properties of a type
    async fn property_candidates(&self, type_info: &TypeInfo) -> Vec<CompletionCandidate> {
        let members = self.navigator.members(type_info).await;
        let mut candidates = Vec::with_capacity(members.len());

        for member in members.iter() {
            let definition = &member.definition;
            let constraints = Constraints::of(definition);
            let metadata = CandidateMetadata {
                is_choice: false,
                is_inherited: member.inherited,
                cardinality: Some(constraints.cardinality()),
                required: constraints.required,
            };

            candidates.push(
                CompletionCandidate::new(member.name.as_str(), CompletionKind::Property)
                    .with_detail(format!("{} [{}]", definition.type_label(), constraints.cardinality()))
                    .with_documentation(definition.documentation.as_deref())
                    .with_metadata(metadata.clone()),
            );

            if !definition.is_choice() {
                continue;
            }
            let Some(choice) = self.navigator.member_type(member).await else {
                continue;
            };
            let alternatives = resolve_choice_types(&choice, None);
            let names = get_choice_property_names(&member.name, &alternatives);
            for (name, alternative) in names.into_iter().zip(&alternatives) {
                candidates.push(
                    CompletionCandidate::new(name, CompletionKind::Property)
                        .with_detail(format!("{} (choice of {}[x])", alternative.name(), member.name))
                        .with_documentation(definition.documentation.as_deref())
                        .with_metadata(CandidateMetadata {
                            is_choice: true,
                            ..metadata.clone()
                        }),
                );
            }
        }

        candidates
    }

    /// Whether any navigated segment may repeat; `None` when a segment has no declared cardinality
    async fn path_is_collection(
        &self,
        navigation_path: &[Arc<TypeInfo>],
        segments: &[String],
    ) -> Option<bool> {
        let mut any_unknown = false;
        for (parent, segment) in navigation_path.iter().zip(segments) {
            match self
                .navigator
                .element_constraints(parent.name(), segment)
                .await
            {
                Some(constraints) if constraints.is_collection() => return Some(true),
                Some(_) => {}
                None => any_unknown = true,
            }
        }
        if any_unknown || segments.is_empty() {
            None
        } else {
            Some(false)
        }
    }
}

/// Drop later candidates whose label and kind repeat an earlier one
fn dedup_by_label(candidates: Vec<CompletionCandidate>) -> Vec<CompletionCandidate> {
    let mut seen = rustc_hash::FxHashSet::default();
    candidates
        .into_iter()
        .filter(|c| seen.insert((c.label.clone(), c.kind)))
        .collect()
}
