//! Completion inside directive comments
//!
//! Directive names, resource type names for `@resource` and JSON files for
//! `@inputfile`. None of this needs property navigation.

use super::candidate::{CompletionCandidate, CompletionKind};
use crate::analyzer::{DIRECTIVE_NAMES, DirectiveContext, DirectiveKind};
use crate::navigator::TypeNavigator;
use log::warn;
use std::path::Path;
use walkdir::WalkDir;

/// Raw candidates for a directive position, unfiltered and unranked
pub async fn directive_candidates(
    context: &DirectiveContext,
    navigator: &TypeNavigator,
    document_dir: Option<&Path>,
    max_depth: usize,
) -> Vec<CompletionCandidate> {
    if context.is_naming {
        return DIRECTIVE_NAMES
            .iter()
            .map(|(name, doc)| {
                CompletionCandidate::new(*name, CompletionKind::Directive)
                    .with_detail(format!("@{name}"))
                    .with_documentation(Some(*doc))
            })
            .collect();
    }

    match context.kind() {
        Some(DirectiveKind::Resource) => navigator
            .all_resource_types()
            .await
            .iter()
            .map(|name| {
                CompletionCandidate::new(name.as_str(), CompletionKind::ResourceType)
                    .with_detail("resource type")
            })
            .collect(),
        Some(DirectiveKind::InputFile) => match document_dir {
            Some(dir) => json_file_candidates(dir, max_depth).await,
            None => Vec::new(),
        },
        Some(DirectiveKind::Input) | None => Vec::new(),
    }
}

/// JSON files below `root`, labelled by their relative path
///
/// The walk runs on the blocking pool.
pub async fn json_file_candidates(root: &Path, max_depth: usize) -> Vec<CompletionCandidate> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || scan_json_files(&root, max_depth))
        .await
        .unwrap_or_else(|err| {
            warn!("JSON file scan failed: {err}");
            Vec::new()
        })
}

fn scan_json_files(root: &Path, max_depth: usize) -> Vec<CompletionCandidate> {
    let mut items: Vec<CompletionCandidate> = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
        })
        .map(|entry| {
            let path = entry.path();
            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let detail = match entry.metadata() {
                Ok(metadata) => format_size(metadata.len()),
                Err(_) => "JSON file".to_string(),
            };
            CompletionCandidate::new(relative_path.clone(), CompletionKind::File)
                .with_detail(detail)
                .with_documentation(Some(format!("**Path:** `{}`", path.display())))
                .with_insert_text(relative_path)
        })
        .collect();

    items.sort_by(|a, b| a.label.cmp(&b.label));
    items
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{size} bytes")
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::detect_directive;
    use crate::cache::CacheConfig;
    use crate::model::InMemoryTypeProvider;
    use std::sync::Arc;

    fn navigator() -> TypeNavigator {
        TypeNavigator::new(
            Arc::new(InMemoryTypeProvider::fhir_r4_core()),
            CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_directive_names() {
        let context = detect_directive("// @re", 6).unwrap();
        let items = directive_candidates(&context, &navigator(), None, 3).await;
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["resource", "inputfile", "input"]);
        assert!(items.iter().all(|i| i.kind == CompletionKind::Directive));
    }

    #[tokio::test]
    async fn test_resource_type_values() {
        let line = "// @resource Pa";
        let context = detect_directive(line, line.len()).unwrap();
        let items = directive_candidates(&context, &navigator(), None, 3).await;
        assert!(items.iter().any(|i| i.label == "Patient"));
        assert!(items.iter().all(|i| i.kind == CompletionKind::ResourceType));
        assert!(!items.iter().any(|i| i.label == "HumanName"));
    }

    #[tokio::test]
    async fn test_input_file_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/patient.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let line = "// @inputfile ";
        let context = detect_directive(line, line.len()).unwrap();
        let items = directive_candidates(&context, &navigator(), Some(dir.path()), 3).await;
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["a.json", "data/patient.json"]);
        assert_eq!(items[0].detail.as_deref(), Some("2 bytes"));
    }

    #[tokio::test]
    async fn test_json_scan_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("top.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a/b/deep.json"), "{}").unwrap();

        let shallow = json_file_candidates(dir.path(), 1).await;
        let labels: Vec<_> = shallow.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["top.json"]);
        assert_eq!(json_file_candidates(dir.path(), 3).await.len(), 2);
        assert!(json_file_candidates(&dir.path().join("missing"), 3).await.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
