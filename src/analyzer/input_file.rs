//! `resourceType` lookup for `@inputfile` documents
//!
//! Completion and diagnostics run on every keystroke, so the JSON file is read
//! through tokio and memoized by path and modification time.

use super::directives::DocumentDirectives;
use crate::cache::{CacheConfig, CacheStats, ResultCache};
use crate::error::{IntellisenseError, Result};
use log::debug;
use serde_json::Value as JsonValue;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InputFileKey {
    path: PathBuf,
    modified: Option<SystemTime>,
}

/// Memoized `resourceType` of input files
///
/// Failures are cached too, so a broken file is not re-read until it changes
/// on disk.
#[derive(Debug)]
pub struct InputFileTypes {
    cache: ResultCache<InputFileKey, std::result::Result<Option<String>, String>>,
}

impl InputFileTypes {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: ResultCache::new("input-files", config),
        }
    }

    /// `resourceType` of the document's `@inputfile`, resolved against `base`
    ///
    /// `Ok(None)` when there is no directive, the file does not exist or the
    /// JSON has no `resourceType`.
    pub async fn resource_type(
        &self,
        directives: &DocumentDirectives,
        base: &Path,
    ) -> Result<Option<String>> {
        let Some(path) = directives.resolve_input_file(base) else {
            return Ok(None);
        };
        let modified = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.modified().ok(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(IntellisenseError::io(&path, err)),
        };

        let key = InputFileKey { path, modified };
        if let Some(cached) = self.cache.get(&key) {
            return cached.map_err(IntellisenseError::config);
        }

        let read = read_resource_type(&key.path).await;
        debug!("read @inputfile {}: {read:?}", key.path.display());
        self.cache.set(key, read.clone());
        read.map_err(IntellisenseError::config)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for InputFileTypes {
    fn default() -> Self {
        Self::new(CacheConfig::new(64, Duration::from_secs(60)))
    }
}

async fn read_resource_type(path: &Path) -> std::result::Result<Option<String>, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&content)
        .map_err(|err| format!("{} is not valid JSON: {err}", path.display()))?;
    Ok(json
        .get("resourceType")
        .and_then(JsonValue::as_str)
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_reads_resource_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pt.json"), r#"{"resourceType":"Patient"}"#).unwrap();
        let types = InputFileTypes::default();

        let directives = DocumentDirectives::parse("// @inputfile pt.json");
        assert_eq!(
            types.resource_type(&directives, dir.path()).await.unwrap().as_deref(),
            Some("Patient")
        );
        let missing = DocumentDirectives::parse("// @input-file nope.json");
        assert_eq!(types.resource_type(&missing, dir.path()).await.unwrap(), None);
        let none = DocumentDirectives::parse("Patient.name");
        assert_eq!(types.resource_type(&none, dir.path()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repeated_lookups_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("obs.json"), r#"{"resourceType":"Observation"}"#).unwrap();
        let types = InputFileTypes::default();
        let directives = DocumentDirectives::parse("// @inputfile obs.json");

        for _ in 0..5 {
            let found = types.resource_type(&directives, dir.path()).await.unwrap();
            assert_eq!(found.as_deref(), Some("Observation"));
        }
        let stats = types.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 4);
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error_each_time() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        let types = InputFileTypes::default();
        let directives = DocumentDirectives::parse("// @inputfile bad.json");

        let first = types.resource_type(&directives, dir.path()).await.unwrap_err();
        let second = types.resource_type(&directives, dir.path()).await.unwrap_err();
        assert!(first.to_string().contains("not valid JSON"));
        assert!(second.to_string().contains("not valid JSON"));
        assert_eq!(types.stats().hits, 1);
    }
}
