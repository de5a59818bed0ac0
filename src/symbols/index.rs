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

//! Workspace symbol index
//!
//! Symbols are kept in three views (by lower-cased name, by kind and by file)
//! behind a single lock, so a file update replaces its symbols in every view
//! at once.

use super::fuzzy::fuzzy_score;
use crate::cache::{CacheConfig, CacheStats, ResultCache};
use crate::parser::span::Span;
use indexmap::IndexMap;
use log::debug;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// What a symbol names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    ResourceType,
    Property,
    Function,
    Variable,
    Directive,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SymbolKind::ResourceType => "resource type",
            SymbolKind::Property => "property",
            SymbolKind::Function => "function",
            SymbolKind::Variable => "variable",
            SymbolKind::Directive => "directive",
        };
        f.write_str(label)
    }
}

/// A symbol declared or referenced by a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolEntry {
    pub name: String,
    pub kind: SymbolKind,
    /// File the symbol belongs to
    pub uri: String,
    /// Byte range in that file
    pub range: Span,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Dotted path from the resource root, for properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_path: Option<String>,
    /// Lower-cased terms filled in by [`SymbolIndex::update_file`]
    #[serde(default)]
    pub search_terms: Vec<String>,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, kind: SymbolKind, uri: impl Into<String>, range: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            uri: uri.into(),
            range,
            container_name: None,
            fhir_path: None,
            search_terms: Vec::new(),
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container_name = Some(container.into());
        self
    }

    pub fn with_fhir_path(mut self, path: impl Into<String>) -> Self {
        self.fhir_path = Some(path.into());
        self
    }

    fn compute_search_terms(&mut self) {
        let mut terms = vec![self.name.to_lowercase()];
        terms.extend(split_words(&self.name));
        if let Some(container) = &self.container_name {
            terms.push(container.to_lowercase());
        }
        if let Some(path) = &self.fhir_path {
            terms.push(path.to_lowercase());
            terms.extend(path.split('.').map(str::to_lowercase));
        }
        let mut seen = FxHashSet::default();
        terms.retain(|term| !term.is_empty() && seen.insert(term.clone()));
        self.search_terms = terms;
    }
}

/// camelCase and punctuation separated words, lower-cased
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Field a query is scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchKey {
    Name,
    ContainerName,
    FhirPath,
    SearchTerms,
}

/// Options for [`SymbolIndex::search`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Cap on returned results
    pub max_results: usize,
    /// Minimum score to keep a candidate
    pub fuzzy_threshold: f64,
    /// Candidates considered for queries of one or two characters
    pub short_query_cap: usize,
    /// Fields to score, best score wins
    pub keys: Vec<SearchKey>,
    /// Only consider symbols of this kind
    pub kind: Option<SymbolKind>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 50,
            fuzzy_threshold: 0.3,
            short_query_cap: 200,
            keys: vec![SearchKey::Name],
            kind: None,
        }
    }
}

impl SearchOptions {
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = SearchKey>) -> Self {
        self.keys = keys.into_iter().collect();
        self
    }

    pub fn with_kind(mut self, kind: SymbolKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// One scored hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub symbol: SymbolEntry,
    pub score: f64,
    /// Key that produced the score
    pub matched_key: SearchKey,
}

/// Counts reported by [`SymbolIndex::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub files: usize,
    pub symbols: usize,
    pub distinct_names: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchCacheKey {
    query: String,
    max_results: usize,
    threshold_bits: u64,
    short_query_cap: usize,
    keys: Vec<SearchKey>,
    kind: Option<SymbolKind>,
    /// Index generation the results were computed against
    generation: u64,
}

impl SearchCacheKey {
    fn new(query: &str, options: &SearchOptions, generation: u64) -> Self {
        Self {
            generation,
            query: query.to_string(),
            max_results: options.max_results,
            threshold_bits: options.fuzzy_threshold.to_bits(),
            short_query_cap: options.short_query_cap,
            keys: options.keys.clone(),
            kind: options.kind,
        }
    }
}

#[derive(Debug, Default)]
struct Indexes {
    by_name: FxHashMap<String, Vec<Arc<SymbolEntry>>>,
    by_kind: FxHashMap<SymbolKind, Vec<Arc<SymbolEntry>>>,
    /// Insertion ordered so short-query slices are stable
    by_file: IndexMap<String, Vec<Arc<SymbolEntry>>>,
    /// Bumped on every write
    generation: u64,
}

impl Indexes {
    fn remove_file(&mut self, uri: &str) -> usize {
        let Some(previous) = self.by_file.shift_remove(uri) else {
            return 0;
        };
        self.generation += 1;
        for entry in &previous {
            let name_key = entry.name.to_lowercase();
            if let Some(bucket) = self.by_name.get_mut(&name_key) {
                bucket.retain(|e| e.uri != uri);
                if bucket.is_empty() {
                    self.by_name.remove(&name_key);
                }
            }
            if let Some(bucket) = self.by_kind.get_mut(&entry.kind) {
                bucket.retain(|e| e.uri != uri);
                if bucket.is_empty() {
                    self.by_kind.remove(&entry.kind);
                }
            }
        }
        previous.len()
    }

    fn insert_file(&mut self, uri: &str, symbols: Vec<Arc<SymbolEntry>>) {
        self.generation += 1;
        for entry in &symbols {
            self.by_name
                .entry(entry.name.to_lowercase())
                .or_default()
                .push(Arc::clone(entry));
            self.by_kind.entry(entry.kind).or_default().push(Arc::clone(entry));
        }
        self.by_file.insert(uri.to_string(), symbols);
    }

    /// Bounded candidate set for a lower-cased query
    fn candidates(&self, query: &str, options: &SearchOptions) -> Vec<Arc<SymbolEntry>> {
        let accept = |entry: &Arc<SymbolEntry>| options.kind.is_none_or(|kind| entry.kind == kind);

        let mut seen = FxHashSet::default();
        let mut candidates = Vec::new();

        if query.chars().count() <= 2 {
            // Exact names always compete, wherever they sit in the slice
            let exact = self
                .by_name
                .get(query)
                .into_iter()
                .flatten()
                .filter(|&entry| accept(entry));
            let all: Box<dyn Iterator<Item = &Arc<SymbolEntry>>> = match options.kind {
                Some(kind) => Box::new(self.by_kind.get(&kind).into_iter().flatten()),
                None => Box::new(self.by_file.values().flatten()),
            };
            for entry in exact.chain(all.take(options.short_query_cap)) {
                if seen.insert(Arc::as_ptr(entry) as usize) {
                    candidates.push(Arc::clone(entry));
                }
            }
            return candidates;
        }

        let mut push = |bucket: &Vec<Arc<SymbolEntry>>| {
            for entry in bucket {
                if accept(entry) && seen.insert(Arc::as_ptr(entry) as usize) {
                    candidates.push(Arc::clone(entry));
                }
            }
        };

        if let Some(exact) = self.by_name.get(query) {
            push(exact);
        }
        let mut prefixed: Vec<_> = self
            .by_name
            .iter()
            .filter(|(name, _)| name.as_str() != query && name.starts_with(query))
            .collect();
        prefixed.sort_by(|a, b| a.0.cmp(b.0));
        let mut contained: Vec<_> = self
            .by_name
            .iter()
            .filter(|(name, _)| !name.starts_with(query) && name.contains(query))
            .collect();
        contained.sort_by(|a, b| a.0.cmp(b.0));
        for (_, bucket) in prefixed.into_iter().chain(contained) {
            push(bucket);
        }
        candidates
    }
}

fn score_key(query: &str, entry: &SymbolEntry, key: SearchKey) -> f64 {
    match key {
        SearchKey::Name => fuzzy_score(query, &entry.name),
        SearchKey::ContainerName => entry
            .container_name
            .as_deref()
            .map_or(0.0, |container| fuzzy_score(query, container)),
        SearchKey::FhirPath => entry
            .fhir_path
            .as_deref()
            .map_or(0.0, |path| fuzzy_score(query, path)),
        SearchKey::SearchTerms => entry
            .search_terms
            .iter()
            .map(|term| fuzzy_score(query, term))
            .fold(0.0, f64::max),
    }
}

/// Searchable symbols of every indexed file
pub struct SymbolIndex {
    indexes: RwLock<Indexes>,
    search_cache: ResultCache<SearchCacheKey, Arc<Vec<SearchResult>>>,
}

impl fmt::Debug for SymbolIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolIndex")
            .field("stats", &self.stats())
            .field("search_cache", &self.search_cache)
            .finish()
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl SymbolIndex {
    /// Create an empty index whose search cache uses `config`
    pub fn new(config: CacheConfig) -> Self {
        Self {
            indexes: RwLock::new(Indexes::default()),
            search_cache: ResultCache::new("symbol-search", config),
        }
    }

    /// Replace every symbol of `uri` with `symbols`
    pub fn update_file(&self, uri: &str, symbols: Vec<SymbolEntry>) {
        let symbols: Vec<Arc<SymbolEntry>> = symbols
            .into_iter()
            .map(|mut entry| {
                entry.uri = uri.to_string();
                entry.compute_search_terms();
                Arc::new(entry)
            })
            .collect();
        let added = symbols.len();

        let removed = {
            let mut indexes = self.indexes.write();
            let removed = indexes.remove_file(uri);
            indexes.insert_file(uri, symbols);
            removed
        };
        self.search_cache.clear();
        debug!("indexed {uri}: -{removed} +{added} symbols");
    }

    /// Drop every symbol of `uri`
    pub fn remove_file(&self, uri: &str) {
        let removed = self.indexes.write().remove_file(uri);
        if removed > 0 {
            self.search_cache.clear();
        }
        debug!("removed {uri}: {removed} symbols");
    }

    /// Symbols currently indexed for `uri`
    pub fn file_symbols(&self, uri: &str) -> Vec<SymbolEntry> {
        self.indexes
            .read()
            .by_file
            .get(uri)
            .map(|symbols| symbols.iter().map(|s| SymbolEntry::clone(s)).collect())
            .unwrap_or_default()
    }

    /// Every symbol of one kind
    pub fn symbols_of_kind(&self, kind: SymbolKind) -> Vec<SymbolEntry> {
        self.indexes
            .read()
            .by_kind
            .get(&kind)
            .map(|symbols| symbols.iter().map(|s| SymbolEntry::clone(s)).collect())
            .unwrap_or_default()
    }

    /// Ranked symbols matching `query`, best first
    pub fn search(&self, query: &str, options: &SearchOptions) -> Arc<Vec<SearchResult>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() || options.max_results == 0 {
            return Arc::new(Vec::new());
        }

        let generation = self.indexes.read().generation;
        if let Some(cached) = self
            .search_cache
            .get(&SearchCacheKey::new(&query, options, generation))
        {
            return cached;
        }

        // Results are keyed by the generation they were computed from, so a
        // write racing with this search can never be served afterwards
        let (candidates, generation) = {
            let indexes = self.indexes.read();
            (indexes.candidates(&query, options), indexes.generation)
        };
        let cache_key = SearchCacheKey::new(&query, options, generation);
        let keys: &[SearchKey] = if options.keys.is_empty() {
            &[SearchKey::Name]
        } else {
            &options.keys
        };

        let mut results: Vec<SearchResult> = candidates
            .iter()
            .filter_map(|entry| {
                let (matched_key, score) = keys
                    .iter()
                    .map(|&key| (key, score_key(&query, entry, key)))
                    .fold((keys[0], 0.0), |best, next| if next.1 > best.1 { next } else { best });
                (score >= options.fuzzy_threshold && score > 0.0).then(|| SearchResult {
                    symbol: SymbolEntry::clone(entry),
                    score,
                    matched_key,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.name.cmp(&b.symbol.name))
                .then_with(|| a.symbol.uri.cmp(&b.symbol.uri))
                .then_with(|| a.symbol.range.start.cmp(&b.symbol.range.start))
        });
        results.truncate(options.max_results);
        debug!(
            "search '{query}': {} candidates, {} results",
            candidates.len(),
            results.len()
        );

        let results = Arc::new(results);
        self.search_cache.set(cache_key, Arc::clone(&results));
        results
    }

    pub fn stats(&self) -> IndexStats {
        let indexes = self.indexes.read();
        IndexStats {
            files: indexes.by_file.len(),
            symbols: indexes.by_file.values().map(Vec::len).sum(),
            distinct_names: indexes.by_name.len(),
        }
    }

    /// Search cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.search_cache.stats()
    }

    pub fn clear(&self) {
        let mut indexes = self.indexes.write();
        let generation = indexes.generation + 1;
        *indexes = Indexes {
            generation,
            ..Indexes::default()
        };
        drop(indexes);
        self.search_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(name: &str, kind: SymbolKind) -> SymbolEntry {
        SymbolEntry::new(name, kind, "", Span::new(0, name.len()))
    }

    fn names(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.symbol.name.as_str()).collect()
    }

    fn populated() -> SymbolIndex {
        let index = SymbolIndex::default();
        index.update_file(
            "file:///a.fhirpath",
            vec![
                entry("Patient", SymbolKind::ResourceType),
                entry("name", SymbolKind::Property)
                    .with_container("Patient")
                    .with_fhir_path("Patient.name"),
                entry("birthDate", SymbolKind::Property).with_fhir_path("Patient.birthDate"),
            ],
        );
        index.update_file(
            "file:///b.fhirpath",
            vec![
                entry("names", SymbolKind::Variable),
                entry("given", SymbolKind::Property)
                    .with_container("Patient.name")
                    .with_fhir_path("Patient.name.given"),
                entry("where", SymbolKind::Function),
            ],
        );
        index
    }

    #[test]
    fn test_exact_match_ranks_first_with_full_score() {
        let index = populated();
        let results = index.search("name", &SearchOptions::default());
        assert_eq!(names(&results), vec!["name", "names"]);
        assert_eq!(results[0].score, 1.0);
        assert!(results[1].score < 1.0);
    }

    #[test]
    fn test_update_file_replaces_previous_symbols() {
        let index = populated();
        index.update_file("file:///a.fhirpath", vec![entry("identifier", SymbolKind::Property)]);

        let hits = index.search("birthDate", &SearchOptions::default());
        assert!(hits.iter().all(|r| r.symbol.uri != "file:///a.fhirpath"));
        assert_eq!(index.file_symbols("file:///a.fhirpath").len(), 1);
        assert_eq!(index.symbols_of_kind(SymbolKind::ResourceType), Vec::new());
        assert_eq!(
            index.stats(),
            IndexStats {
                files: 2,
                symbols: 4,
                distinct_names: 4
            }
        );
    }

    #[test]
    fn test_remove_file_leaves_no_orphans() {
        let index = populated();
        index.remove_file("file:///b.fhirpath");
        assert!(index.search("given", &SearchOptions::default()).is_empty());
        assert!(index.symbols_of_kind(SymbolKind::Function).is_empty());
        assert_eq!(index.stats().files, 1);
        index.remove_file("file:///missing.fhirpath");
        assert_eq!(index.stats().symbols, 3);
    }

    #[test]
    fn test_search_results_are_cached_until_index_changes() {
        let index = populated();
        let options = SearchOptions::default();
        let first = index.search("given", &options);
        let second = index.search("given", &options);
        assert!(Arc::ptr_eq(&first, &second));

        index.update_file("file:///c.fhirpath", vec![entry("given", SymbolKind::Property)]);
        let third = index.search("given", &options);
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_short_query_scans_capped_slice() {
        let index = populated();
        let options = SearchOptions {
            short_query_cap: 2,
            ..Default::default()
        };
        // Only "Patient" and "name" are considered
        assert_eq!(names(&index.search("na", &options)), vec!["name"]);
        assert_eq!(
            names(&index.search("na", &SearchOptions::default())),
            vec!["name", "names"]
        );
    }

    #[test]
    fn test_short_query_finds_exact_name_past_the_cap() {
        let index = SymbolIndex::default();
        let filler = (0..300)
            .map(|i| entry(&format!("sym{i}"), SymbolKind::Variable))
            .collect();
        index.update_file("file:///a.fhirpath", filler);
        index.update_file("file:///b.fhirpath", vec![entry("id", SymbolKind::Property)]);

        let hits = index.search("id", &SearchOptions::default());
        assert_eq!(hits[0].symbol.name, "id");
        assert_eq!(hits[0].score, 1.0);

        let variables = SearchOptions::default().with_kind(SymbolKind::Variable);
        assert!(index.search("id", &variables).iter().all(|r| r.symbol.name != "id"));
    }

    #[test]
    fn test_concurrent_writes_never_leave_stale_results() {
        let index = SymbolIndex::default();
        let options = SearchOptions::default();
        let uri = "file:///edit.fhirpath";

        for _ in 0..50 {
            index.update_file(uri, vec![entry("telecom", SymbolKind::Property)]);
            let barrier = std::sync::Barrier::new(2);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    index.search("telecom", &options);
                });
                scope.spawn(|| {
                    barrier.wait();
                    index.update_file(uri, vec![entry("address", SymbolKind::Property)]);
                });
            });
            assert!(index.search("telecom", &options).is_empty());
        }
    }

    #[test]
    fn test_clear_invalidates_cached_searches() {
        let index = populated();
        let options = SearchOptions::default();
        assert_eq!(index.search("given", &options).len(), 1);
        index.clear();
        assert!(index.search("given", &options).is_empty());
        assert_eq!(index.stats(), IndexStats::default());
    }

    #[test]
    fn test_keys_and_kind_filter() {
        let index = populated();
        let options = SearchOptions::default()
            .with_keys([SearchKey::Name, SearchKey::FhirPath])
            .with_kind(SymbolKind::Property);
        let results = index.search("patient.name", &options);
        // "patient.name" is not a substring of any name
        assert!(results.is_empty());

        let results = index.search("name", &options);
        assert_eq!(names(&results), vec!["name"]);
        assert_eq!(results[0].matched_key, SearchKey::Name);
    }

    #[test]
    fn test_search_terms_cover_camel_case_words() {
        let index = populated();
        let symbols = index.file_symbols("file:///a.fhirpath");
        let birth = symbols.iter().find(|s| s.name == "birthDate").unwrap();
        assert!(birth.search_terms.contains(&"date".to_string()));
        assert!(birth.search_terms.contains(&"patient.birthdate".to_string()));
    }

    #[test]
    fn test_threshold_and_limit() {
        let index = populated();
        let strict = SearchOptions {
            fuzzy_threshold: 0.95,
            ..Default::default()
        };
        assert_eq!(names(&index.search("name", &strict)), vec!["name"]);
        let one = SearchOptions::default().with_max_results(1);
        assert_eq!(index.search("name", &one).len(), 1);
        assert!(index.search("   ", &SearchOptions::default()).is_empty());
    }
}
