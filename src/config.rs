//! Configuration management

use crate::cache::CacheConfig;
use crate::symbols::SearchOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-workspace configuration file
pub const CONFIG_FILE_NAME: &str = ".fhirpath-intellisense.toml";

/// Service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion settings
    pub completion: CompletionConfig,
    /// Per-domain cache settings
    pub cache: CacheSettings,
    /// Workspace indexing settings
    pub index: IndexConfig,
    /// Default symbol search options
    pub search: SearchOptions,
}

/// Completion synthesis and ranking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Cap on returned candidates
    pub max_suggestions: usize,
    /// Cap when the list is filtered by a typed token
    pub filtered_max_suggestions: usize,
    /// Attach documentation to candidates
    pub include_documentation: bool,
    /// Accept substring matches when nothing matches by prefix
    pub fuzzy_matching: bool,
    /// Order candidates by bucket and score
    pub sort_by_relevance: bool,
    /// Score candidates within a bucket instead of sorting by label
    pub priority_weighting: Option<PriorityWeighting>,
    /// Post-filters applied before ranking
    pub semantic_filtering: SemanticFiltering,
    /// Bound on the usage-frequency table
    pub usage_table_limit: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_suggestions: 50,
            filtered_max_suggestions: 30,
            include_documentation: true,
            fuzzy_matching: true,
            sort_by_relevance: true,
            priority_weighting: None,
            semantic_filtering: SemanticFiltering::default(),
            usage_table_limit: 1000,
        }
    }
}

/// Additive scoring weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeighting {
    /// Bonus for commonly used elements
    pub common_elements: f64,
    /// Bonus per recorded use, capped at three uses
    pub recently_used: f64,
    /// Bonus for required and directly declared elements
    pub type_relevance: f64,
}

impl Default for PriorityWeighting {
    fn default() -> Self {
        Self {
            common_elements: 1.0,
            recently_used: 0.5,
            type_relevance: 0.75,
        }
    }
}

/// Independent semantic post-filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticFiltering {
    /// Drop candidates that cannot appear at the cursor (keywords after a dot)
    pub filter_by_scope: bool,
    /// Drop collection functions on single-valued elements
    pub filter_by_cardinality: bool,
    /// Restrict candidates inside indexers
    pub filter_by_context: bool,
}

impl Default for SemanticFiltering {
    fn default() -> Self {
        Self {
            filter_by_scope: true,
            filter_by_cardinality: true,
            filter_by_context: true,
        }
    }
}

/// Cache settings for each result domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Parsed expressions
    pub expressions: CacheConfig,
    /// Enhanced types and navigation results
    pub types: CacheConfig,
    /// Completion lists
    pub completions: CacheConfig,
    /// Symbol search results
    pub search: CacheConfig,
    /// `resourceType` of `@inputfile` documents
    pub input_files: CacheConfig,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            expressions: CacheConfig::new(500, Duration::from_secs(10 * 60)),
            types: CacheConfig::new(1000, Duration::from_secs(30 * 60)),
            completions: CacheConfig::new(500, Duration::from_secs(5 * 60)),
            search: CacheConfig::new(100, Duration::from_secs(60)),
            input_files: CacheConfig::new(64, Duration::from_secs(60)),
        }
    }
}

/// Workspace indexing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Workers consuming the indexing queue
    pub worker_count: usize,
    /// Files applied to the index between yields
    pub batch_size: usize,
    /// Bound of the indexing queue
    pub queue_capacity: usize,
    /// File extensions to index, without the dot
    pub extensions: Vec<String>,
    /// Maximum directory depth to walk
    pub max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 10,
            queue_capacity: 64,
            extensions: vec!["fhirpath".to_string()],
            max_depth: 8,
        }
    }
}

impl IndexConfig {
    /// Whether a path has one of the configured extensions
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Find configuration file in workspace
    pub fn find_config_file(workspace_root: &Path) -> Option<PathBuf> {
        let config_path = workspace_root.join(CONFIG_FILE_NAME);
        config_path.exists().then_some(config_path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let completion = &self.completion;
        if completion.max_suggestions == 0 {
            anyhow::bail!("completion.max_suggestions must be > 0");
        }
        if completion.filtered_max_suggestions > completion.max_suggestions {
            anyhow::bail!(
                "completion.filtered_max_suggestions ({}) exceeds completion.max_suggestions ({})",
                completion.filtered_max_suggestions,
                completion.max_suggestions
            );
        }
        if completion.usage_table_limit < 2 {
            anyhow::bail!("completion.usage_table_limit must be >= 2");
        }

        for (domain, cache) in [
            ("expressions", &self.cache.expressions),
            ("types", &self.cache.types),
            ("completions", &self.cache.completions),
            ("search", &self.cache.search),
            ("input_files", &self.cache.input_files),
        ] {
            if cache.capacity == 0 {
                anyhow::bail!("cache.{domain}.capacity must be > 0");
            }
        }

        if self.index.worker_count == 0 {
            anyhow::bail!("index.worker_count must be > 0");
        }
        if self.index.batch_size == 0 || self.index.queue_capacity == 0 {
            anyhow::bail!("index.batch_size and index.queue_capacity must be > 0");
        }

        if !(0.0..=1.0).contains(&self.search.fuzzy_threshold) {
            anyhow::bail!(
                "search.fuzzy_threshold must be within 0.0..=1.0, got {}",
                self.search.fuzzy_threshold
            );
        }
        if self.search.max_results == 0 {
            anyhow::bail!("search.max_results must be > 0");
        }

        Ok(())
    }
}
