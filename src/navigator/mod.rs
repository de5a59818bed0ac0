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

//! Type model navigation
//!
//! [`TypeNavigator`] walks the schema exposed by a [`TypeProvider`]: it builds
//! type hierarchies, resolves dotted property paths segment by segment,
//! expands choice elements and validates choice property names. Every
//! provider failure is absorbed here; callers only ever see present or
//! absent results.

pub mod choice_types;
pub mod suggestions;

pub use choice_types::{
    candidate_splits, capitalize, extract_base_property, extract_choice_type,
    get_choice_property_names, is_choice_property, resolve_choice_types,
};
pub use suggestions::{closest_match, levenshtein_distance};

use crate::cache::{CacheConfig, ResultCache};
use crate::error::ProviderError;
use crate::model::{ElementDefinition, TerminologyBinding, TypeInfo, TypeProvider};
use log::{debug, warn};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::sync::Arc;

/// Cardinality facts about an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Constraints {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences, `None` for unbounded
    pub max: Option<u32>,
    /// Whether at least one occurrence is mandatory
    pub required: bool,
}

impl Constraints {
    /// Constraints declared by an element definition
    pub fn of(element: &ElementDefinition) -> Self {
        Self {
            min: element.min,
            max: element.max,
            required: element.is_required(),
        }
    }

    /// `min..max` notation
    pub fn cardinality(&self) -> String {
        match self.max {
            Some(max) => format!("{}..{}", self.min, max),
            None => format!("{}..*", self.min),
        }
    }

    /// Whether more than one value is allowed
    pub fn is_collection(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }
}

/// A type together with its ancestry
///
/// Built once per type name and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedTypeInfo {
    /// The type itself
    pub type_info: Arc<TypeInfo>,
    /// Self first, then each base type up to the root
    pub hierarchy: Vec<Arc<TypeInfo>>,
    /// Element-level constraints, when describing an element
    pub constraints: Option<Constraints>,
    /// Element-level binding, when describing an element
    pub binding: Option<TerminologyBinding>,
}

impl EnhancedTypeInfo {
    /// Names of the ancestor types, excluding self
    pub fn ancestor_names(&self) -> Vec<&str> {
        self.hierarchy.iter().skip(1).map(|t| t.name()).collect()
    }
}

/// An element reachable on a type, own or inherited
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Element name as declared (`value` for `value[x]`)
    pub name: String,
    /// Declaration
    pub definition: ElementDefinition,
    /// Type that declares the element
    pub declared_by: String,
    /// Declared by an ancestor rather than the type itself
    pub inherited: bool,
}

/// Outcome of resolving a dotted property path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationResult {
    pub is_valid: bool,
    /// Type of the last segment on success
    pub final_type: Option<Arc<TypeInfo>>,
    /// Root followed by the type of each resolved segment
    pub navigation_path: Vec<Arc<TypeInfo>>,
    /// Sibling names at the failing depth
    pub available_properties: Vec<String>,
    pub errors: Vec<String>,
    /// Closest sibling to the failing segment
    pub suggestion: Option<String>,
    /// Index of the failing segment
    pub failed_segment: Option<usize>,
}

/// Outcome of [`TypeNavigator::validate_choice_property`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChoiceValidation {
    pub is_valid: bool,
    /// Choice element the name was decomposed into, if any
    pub base_property: Option<String>,
    /// Concrete names of that choice element, sorted
    pub valid_choices: Vec<String>,
    /// Closest valid name when invalid
    pub suggested_property: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PathMode {
    Exact,
    ChoiceAware,
}

type PathKey = (PathMode, String, Vec<String>);

/// Schema navigation with memoized results
pub struct TypeNavigator {
    provider: Arc<dyn TypeProvider>,
    types: ResultCache<String, Option<Arc<EnhancedTypeInfo>>>,
    members: ResultCache<String, Arc<Vec<Member>>>,
    paths: ResultCache<PathKey, Arc<NavigationResult>>,
    choices: ResultCache<(String, String), Arc<ChoiceValidation>>,
    resource_types: ResultCache<(), Arc<Vec<String>>>,
}

impl std::fmt::Debug for TypeNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeNavigator")
            .field("provider", &self.provider)
            .field("types", &self.types)
            .field("paths", &self.paths)
            .finish()
    }
}

/// Log an absorbed provider failure
fn absorb(operation: &str, subject: &str, error: &ProviderError) {
    match error {
        ProviderError::Unavailable => {
            debug!("{operation}({subject}): type provider unavailable");
        }
        other => warn!("{operation}({subject}) failed: {other}"),
    }
}

impl TypeNavigator {
    /// Create a navigator over a provider; every operation gets its own cache
    pub fn new(provider: Arc<dyn TypeProvider>, config: CacheConfig) -> Self {
        Self {
            provider,
            types: ResultCache::new("types", config.clone()),
            members: ResultCache::new("type-members", config.clone()),
            paths: ResultCache::new("paths", config.clone()),
            choices: ResultCache::new("choice-properties", config.clone()),
            resource_types: ResultCache::new("resource-types", config),
        }
    }

    /// The underlying provider
    pub fn provider(&self) -> &Arc<dyn TypeProvider> {
        &self.provider
    }

    /// Drop every memoized result
    pub fn clear_caches(&self) {
        self.types.clear();
        self.members.clear();
        self.paths.clear();
        self.choices.clear();
        self.resource_types.clear();
    }

    async fn fetch_type(&self, name: &str) -> Result<Option<Arc<TypeInfo>>, ProviderError> {
        self.provider.get_type(name).await
    }

    /// Type with its hierarchy, `None` when the provider does not know it
    pub async fn get_enhanced_type(&self, name: &str) -> Option<Arc<EnhancedTypeInfo>> {
        if let Some(cached) = self.types.get(name) {
            return cached;
        }

        let type_info = match self.fetch_type(name).await {
            Ok(found) => found,
            Err(err) => {
                absorb("get_enhanced_type", name, &err);
                return None;
            }
        };

        let enhanced = match type_info {
            Some(type_info) => Some(Arc::new(self.build_enhanced(type_info).await)),
            None => None,
        };
        self.types.set(name.to_string(), enhanced.clone());
        enhanced
    }

    async fn build_enhanced(&self, type_info: Arc<TypeInfo>) -> EnhancedTypeInfo {
        let mut hierarchy = vec![Arc::clone(&type_info)];
        let mut visited: FxHashSet<String> = FxHashSet::default();
        visited.insert(type_info.name().to_string());

        let mut next = type_info.base_type_name().map(str::to_string);
        while let Some(base) = next.take() {
            if !visited.insert(base.clone()) {
                debug!("hierarchy of {} loops back to {base}", type_info.name());
                break;
            }
            match self.fetch_type(&base).await {
                Ok(Some(base_type)) => {
                    next = base_type.base_type_name().map(str::to_string);
                    hierarchy.push(base_type);
                }
                Ok(None) => debug!("base type {base} of {} is unknown", type_info.name()),
                Err(err) => absorb("get_enhanced_type", &base, &err),
            }
        }

        EnhancedTypeInfo {
            type_info,
            hierarchy,
            constraints: None,
            binding: None,
        }
    }

    /// Every element reachable on a type, own elements first
    ///
    /// A choice type exposes the union of its alternatives' elements.
    pub async fn members(&self, type_info: &TypeInfo) -> Arc<Vec<Member>> {
        match type_info {
            TypeInfo::Primitive { .. } => Arc::new(Vec::new()),
            TypeInfo::Choice { alternatives, .. } => {
                let mut seen = FxHashSet::default();
                let mut merged = Vec::new();
                for alternative in alternatives {
                    for member in self.named_members(alternative).await.iter() {
                        if seen.insert(member.name.clone()) {
                            merged.push(member.clone());
                        }
                    }
                }
                Arc::new(merged)
            }
            TypeInfo::Complex { .. } | TypeInfo::Resource { .. } => {
                self.named_members(type_info).await
            }
        }
    }

    async fn named_members(&self, type_info: &TypeInfo) -> Arc<Vec<Member>> {
        let name = type_info.name();
        if let Some(cached) = self.members.get(name) {
            return cached;
        }

        let hierarchy = match self.get_enhanced_type(name).await {
            Some(enhanced) => enhanced.hierarchy.clone(),
            None => vec![Arc::new(type_info.clone())],
        };

        let mut seen = FxHashSet::default();
        let mut members = Vec::new();
        for (depth, declaring) in hierarchy.iter().enumerate() {
            let Some(elements) = declaring.elements() else {
                continue;
            };
            for (element_name, definition) in elements {
                if seen.insert(element_name.clone()) {
                    members.push(Member {
                        name: element_name.clone(),
                        definition: definition.clone(),
                        declared_by: declaring.name().to_string(),
                        inherited: depth > 0,
                    });
                }
            }
        }

        let members = Arc::new(members);
        self.members.set(name.to_string(), Arc::clone(&members));
        members
    }

    /// Type of a member element, choice elements resolved to a `Choice`
    pub async fn member_type(&self, member: &Member) -> Option<Arc<TypeInfo>> {
        let declaring = match self.get_enhanced_type(&member.declared_by).await {
            Some(enhanced) => Arc::clone(&enhanced.type_info),
            None => return None,
        };
        match self.provider.element_type(&declaring, &member.name).await {
            Ok(found) => found,
            Err(err) => {
                absorb("element_type", &format!("{}.{}", member.declared_by, member.name), &err);
                None
            }
        }
    }

    /// Resource type names known to the provider
    pub async fn all_resource_types(&self) -> Arc<Vec<String>> {
        if let Some(cached) = self.resource_types.get(&()) {
            return cached;
        }
        if !self.provider.capabilities().resource_listing {
            return Arc::new(Vec::new());
        }
        match self.provider.all_resource_types().await {
            Ok(names) => {
                let names = Arc::new(names);
                self.resource_types.set((), Arc::clone(&names));
                names
            }
            Err(err) => {
                absorb("all_resource_types", "*", &err);
                Arc::new(Vec::new())
            }
        }
    }

    /// Resolve `path` from `root_type_name` by exact element names
    pub async fn navigate_property_path(
        &self,
        root_type_name: &str,
        path: &[String],
    ) -> Arc<NavigationResult> {
        self.navigate(PathMode::Exact, root_type_name, path).await
    }

    /// Like [`Self::navigate_property_path`], but a segment that is not an
    /// element is retried as a concrete choice name (`valueQuantity`)
    pub async fn resolve_path(&self, root_type_name: &str, path: &[String]) -> Arc<NavigationResult> {
        self.navigate(PathMode::ChoiceAware, root_type_name, path).await
    }

    async fn navigate(
        &self,
        mode: PathMode,
        root_type_name: &str,
        path: &[String],
    ) -> Arc<NavigationResult> {
        let key = (mode, root_type_name.to_string(), path.to_vec());
        if let Some(cached) = self.paths.get(&key) {
            return cached;
        }

        let Some(root) = self.get_enhanced_type(root_type_name).await else {
            // Not cached: the provider may become available later
            return Arc::new(NavigationResult {
                errors: vec![format!("Unknown type '{root_type_name}'")],
                ..Default::default()
            });
        };

        let mut current = Arc::clone(&root.type_info);
        let mut navigation_path = vec![Arc::clone(&current)];

        for (index, segment) in path.iter().enumerate() {
            let members = self.members(&current).await;
            let mut next = None;
            if let Some(member) = members.iter().find(|m| &m.name == segment) {
                next = self.member_type(member).await;
            } else if mode == PathMode::ChoiceAware {
                next = self.concrete_choice_type(&members, segment).await;
            }

            match next {
                Some(resolved) => {
                    debug!("{root_type_name}: segment '{segment}' -> {}", resolved.name());
                    navigation_path.push(Arc::clone(&resolved));
                    current = resolved;
                }
                None => {
                    let available: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
                    let suggestion = closest_match(segment, available.iter().map(String::as_str));
                    let result = Arc::new(NavigationResult {
                        is_valid: false,
                        final_type: None,
                        navigation_path,
                        errors: vec![format!(
                            "Property '{segment}' not found on type '{}'",
                            current.name()
                        )],
                        available_properties: available,
                        suggestion,
                        failed_segment: Some(index),
                    });
                    self.paths.set(key, Arc::clone(&result));
                    return result;
                }
            }
        }

        let result = Arc::new(NavigationResult {
            is_valid: true,
            final_type: Some(current),
            navigation_path,
            ..Default::default()
        });
        self.paths.set(key, Arc::clone(&result));
        result
    }

    /// Alternative type named by a concrete choice property such as `valueQuantity`
    async fn concrete_choice_type(&self, members: &[Member], name: &str) -> Option<Arc<TypeInfo>> {
        for (base, _) in candidate_splits(name) {
            let Some(member) = members.iter().find(|m| m.name == base) else {
                continue;
            };
            if !member.definition.is_choice() {
                continue;
            }
            let choice = self.member_type(member).await?;
            return resolve_choice_types(&choice, None)
                .into_iter()
                .find(|alt| format!("{base}{}", capitalize(alt.name())) == name);
        }
        None
    }

    /// Alternatives of a choice type, see [`resolve_choice_types`]
    pub fn resolve_choice_types(
        &self,
        type_info: &Arc<TypeInfo>,
        filter_name: Option<&str>,
    ) -> Vec<Arc<TypeInfo>> {
        resolve_choice_types(type_info, filter_name)
    }

    /// Concrete names of a choice element, see [`get_choice_property_names`]
    pub fn get_choice_property_names(&self, base: &str, choices: &[Arc<TypeInfo>]) -> Vec<String> {
        get_choice_property_names(base, choices)
    }

    /// Check a possibly-concrete choice property name against a resource type
    pub async fn validate_choice_property(
        &self,
        resource_type_name: &str,
        property_name: &str,
    ) -> Arc<ChoiceValidation> {
        let key = (resource_type_name.to_string(), property_name.to_string());
        if let Some(cached) = self.choices.get(&key) {
            return cached;
        }

        let Some(resource) = self.get_enhanced_type(resource_type_name).await else {
            return Arc::new(ChoiceValidation::default());
        };
        let members = self.members(&resource.type_info).await;

        // Longest base that names a choice element wins
        let choice_member = candidate_splits(property_name)
            .into_iter()
            .filter(|(base, _)| base.chars().next().is_some_and(|c| c.is_ascii_lowercase()))
            .find_map(|(base, _)| {
                members
                    .iter()
                    .find(|m| m.name == base && m.definition.choices.len() > 1)
            });

        let result = match choice_member {
            Some(member) => {
                let alternatives = match self.member_type(member).await {
                    Some(choice) => resolve_choice_types(&choice, None),
                    None => Vec::new(),
                };
                let mut valid_choices = get_choice_property_names(&member.name, &alternatives);
                valid_choices.sort();
                let is_valid = valid_choices.iter().any(|c| c == property_name);
                let suggested_property = if is_valid {
                    None
                } else {
                    closest_match(property_name, valid_choices.iter().map(String::as_str))
                };
                ChoiceValidation {
                    is_valid,
                    base_property: Some(member.name.clone()),
                    valid_choices,
                    suggested_property,
                }
            }
            None => {
                let is_valid = members.iter().any(|m| m.name == property_name);
                ChoiceValidation {
                    is_valid,
                    base_property: None,
                    valid_choices: Vec::new(),
                    suggested_property: if is_valid {
                        None
                    } else {
                        closest_match(property_name, members.iter().map(|m| m.name.as_str()))
                    },
                }
            }
        };

        let result = Arc::new(result);
        self.choices.set(key, Arc::clone(&result));
        result
    }

    /// Cardinality of `element` on `type_name`, inherited elements included
    pub async fn element_constraints(&self, type_name: &str, element: &str) -> Option<Constraints> {
        let enhanced = self.get_enhanced_type(type_name).await?;
        let members = self.members(&enhanced.type_info).await;
        members
            .iter()
            .find(|m| m.name == element)
            .map(|m| Constraints::of(&m.definition))
    }

    /// Element-level view: the element's type with its constraints and binding
    pub async fn enhanced_element(&self, type_name: &str, element: &str) -> Option<EnhancedTypeInfo> {
        let enhanced = self.get_enhanced_type(type_name).await?;
        let members = self.members(&enhanced.type_info).await;
        let member = members.iter().find(|m| m.name == element)?;
        let element_type = self.member_type(member).await?;
        let hierarchy = match self.get_enhanced_type(element_type.name()).await {
            Some(found) => found.hierarchy.clone(),
            None => vec![Arc::clone(&element_type)],
        };
        Some(EnhancedTypeInfo {
            type_info: element_type,
            hierarchy,
            constraints: Some(Constraints::of(&member.definition)),
            binding: member.definition.binding.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmptyTypeProvider, InMemoryTypeProvider};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn navigator() -> TypeNavigator {
        TypeNavigator::new(
            Arc::new(InMemoryTypeProvider::fhir_r4_core()),
            CacheConfig::default(),
        )
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_enhanced_type_hierarchy() {
        let navigator = navigator();
        let patient = navigator.get_enhanced_type("Patient").await.unwrap();
        assert_eq!(patient.ancestor_names(), vec!["DomainResource", "Resource"]);
        assert!(navigator.get_enhanced_type("Nope").await.is_none());
    }

    #[tokio::test]
    async fn test_hierarchy_stops_on_cycles() {
        let provider = InMemoryTypeProvider::from_types([
            TypeInfo::complex("A").with_base("B"),
            TypeInfo::complex("B").with_base("A"),
        ]);
        let navigator = TypeNavigator::new(Arc::new(provider), CacheConfig::default());
        let a = navigator.get_enhanced_type("A").await.unwrap();
        let names: Vec<_> = a.hierarchy.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_navigate_valid_path() {
        let navigator = navigator();
        let result = navigator
            .navigate_property_path("Patient", &path(&["name", "given"]))
            .await;
        assert!(result.is_valid);
        assert_eq!(result.final_type.as_ref().unwrap().name(), "string");
        assert_eq!(result.navigation_path.len(), 3);
    }

    #[tokio::test]
    async fn test_navigate_inherited_element() {
        let navigator = navigator();
        let result = navigator
            .navigate_property_path("Patient", &path(&["meta", "lastUpdated"]))
            .await;
        assert!(result.is_valid);
        assert_eq!(result.final_type.as_ref().unwrap().name(), "instant");
    }

    #[tokio::test]
    async fn test_empty_path_returns_root() {
        let navigator = navigator();
        let result = navigator.navigate_property_path("Observation", &[]).await;
        assert!(result.is_valid);
        assert_eq!(result.final_type.as_ref().unwrap().name(), "Observation");
        assert_eq!(result.navigation_path.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_segment_lists_siblings_at_depth() {
        let navigator = navigator();
        let result = navigator
            .navigate_property_path("Patient", &path(&["name", "famly"]))
            .await;
        assert!(!result.is_valid);
        assert_eq!(result.failed_segment, Some(1));
        assert_eq!(result.suggestion.as_deref(), Some("family"));
        assert!(result.available_properties.contains(&"given".to_string()));
        assert!(!result.available_properties.contains(&"gender".to_string()));
        let unique: FxHashSet<_> = result.available_properties.iter().collect();
        assert_eq!(unique.len(), result.available_properties.len());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("famly"));
    }

    #[tokio::test]
    async fn test_exact_navigation_rejects_concrete_choice_names() {
        let navigator = navigator();
        let exact = navigator
            .navigate_property_path("Observation", &path(&["valueQuantity", "unit"]))
            .await;
        assert!(!exact.is_valid);

        let resolved = navigator
            .resolve_path("Observation", &path(&["valueQuantity", "unit"]))
            .await;
        assert!(resolved.is_valid);
        assert_eq!(resolved.navigation_path[1].name(), "Quantity");
    }

    #[tokio::test]
    async fn test_navigation_through_choice_base() {
        let navigator = navigator();
        let result = navigator
            .navigate_property_path("Observation", &path(&["value"]))
            .await;
        assert!(result.is_valid);
        assert!(result.final_type.as_ref().unwrap().is_choice());
    }

    #[tokio::test]
    async fn test_validate_choice_property() {
        let navigator = navigator();

        let valid = navigator
            .validate_choice_property("Observation", "valueQuantity")
            .await;
        assert!(valid.is_valid);
        assert_eq!(valid.base_property.as_deref(), Some("value"));

        let typo = navigator
            .validate_choice_property("Observation", "valueIntger")
            .await;
        assert!(!typo.is_valid);
        assert_eq!(typo.suggested_property.as_deref(), Some("valueInteger"));
        let mut sorted = typo.valid_choices.clone();
        sorted.sort();
        assert_eq!(typo.valid_choices, sorted);

        let multi_word = navigator
            .validate_choice_property("Patient", "multipleBirthInteger")
            .await;
        assert!(multi_word.is_valid);

        let plain = navigator.validate_choice_property("Patient", "birthDate").await;
        assert!(plain.is_valid);
        assert_eq!(plain.base_property, None);
    }

    #[tokio::test]
    async fn test_element_constraints() {
        let navigator = navigator();
        let status = navigator
            .element_constraints("Observation", "status")
            .await
            .unwrap();
        assert!(status.required);
        assert_eq!(status.cardinality(), "1..1");
        let name = navigator.element_constraints("Patient", "name").await.unwrap();
        assert!(name.is_collection());
        assert!(navigator.element_constraints("Patient", "nope").await.is_none());
    }

    #[tokio::test]
    async fn test_enhanced_element_carries_binding() {
        let navigator = navigator();
        let gender = navigator.enhanced_element("Patient", "gender").await.unwrap();
        assert_eq!(gender.type_info.name(), "code");
        assert!(gender.binding.is_some());
        assert_eq!(gender.constraints.unwrap().cardinality(), "0..1");
    }

    #[tokio::test]
    async fn test_unavailable_provider_degrades_silently() {
        let navigator = TypeNavigator::new(Arc::new(EmptyTypeProvider), CacheConfig::default());
        assert!(navigator.get_enhanced_type("Patient").await.is_none());
        let result = navigator
            .navigate_property_path("Patient", &path(&["name"]))
            .await;
        assert!(!result.is_valid);
        assert!(result.available_properties.is_empty());
        assert!(navigator.all_resource_types().await.is_empty());
    }

    #[derive(Debug)]
    struct CountingProvider {
        inner: InMemoryTypeProvider,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TypeProvider for CountingProvider {
        fn capabilities(&self) -> crate::model::ProviderCapabilities {
            self.inner.capabilities()
        }

        async fn get_type(&self, name: &str) -> crate::model::ProviderResult<Option<Arc<TypeInfo>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_type(name).await
        }

        async fn all_resource_types(&self) -> crate::model::ProviderResult<Vec<String>> {
            self.inner.all_resource_types().await
        }
    }

    #[tokio::test]
    async fn test_results_are_memoized_until_cleared() {
        let provider = Arc::new(CountingProvider {
            inner: InMemoryTypeProvider::fhir_r4_core(),
            calls: AtomicUsize::new(0),
        });
        let navigator = TypeNavigator::new(provider.clone(), CacheConfig::default());

        navigator.get_enhanced_type("Patient").await;
        let after_first = provider.calls.load(Ordering::SeqCst);
        navigator.get_enhanced_type("Patient").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), after_first);

        navigator.clear_caches();
        navigator.get_enhanced_type("Patient").await;
        assert!(provider.calls.load(Ordering::SeqCst) > after_first);
    }
}
