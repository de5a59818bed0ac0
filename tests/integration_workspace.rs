//! Workspace indexing and symbol search through the service facade

use octofhir_fhirpath_intellisense::symbols::{CancellationFlag, SearchKey, file_uri};
use octofhir_fhirpath_intellisense::{
    Config, InMemoryTypeProvider, IntellisenseService, SearchOptions, SymbolKind,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;

fn service() -> IntellisenseService {
    IntellisenseService::new(
        Arc::new(InMemoryTypeProvider::fhir_r4_core()),
        Config::default(),
    )
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("patient.fhirpath"),
        "// @resource Patient\nname.given\nbirthDate",
    )
    .unwrap();
    fs::create_dir(dir.path().join("obs")).unwrap();
    fs::write(
        dir.path().join("obs").join("vitals.fhirpath"),
        "Observation.valueQuantity.unit\nObservation.status",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "Patient.telecom").unwrap();
    dir
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_workspace_then_search() {
    let dir = workspace();
    let service = service();
    let report = service
        .index_workspace(dir.path(), &CancellationFlag::new())
        .await;
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.files_failed, 0);
    assert!(!report.cancelled);

    let hits = service.search("birthDate", None);
    assert_eq!(hits[0].symbol.name, "birthDate");
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(
        hits[0].symbol.uri,
        file_uri(&dir.path().join("patient.fhirpath"))
    );

    // Files outside the configured extensions are not indexed
    assert!(service.search("telecom", None).is_empty());
}

#[tokio::test]
async fn exact_match_ranks_first() {
    let service = service();
    service
        .update_file("file:///w/a.fhirpath", "Patient.name.given")
        .await
        .unwrap();
    service
        .update_file("file:///w/b.fhirpath", "Patient.name.family")
        .await
        .unwrap();

    let hits = service.search("name", None);
    assert!(hits.len() >= 2);
    assert!(hits.iter().take(2).all(|hit| hit.symbol.name == "name"));
    assert!(hits.iter().take(2).all(|hit| hit.score == 1.0));
    assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn reindexing_a_file_drops_old_symbols() {
    let service = service();
    let uri = "file:///w/edit.fhirpath";
    service.update_file(uri, "Patient.telecom").await.unwrap();
    assert_eq!(service.search("telecom", None).len(), 1);

    service.update_file(uri, "Patient.address").await.unwrap();
    assert!(service.search("telecom", None).is_empty());
    assert_eq!(service.search("address", None)[0].symbol.uri, uri);
}

#[tokio::test]
async fn search_reports_paths_and_filters_kind() {
    let service = service();
    service
        .update_file("file:///w/a.fhirpath", "// @resource Patient\nname.given.first()")
        .await
        .unwrap();

    let options = SearchOptions::default().with_keys([SearchKey::Name, SearchKey::FhirPath]);
    let hits = service.search("given", Some(&options));
    assert_eq!(hits[0].symbol.name, "given");
    assert_eq!(hits[0].matched_key, SearchKey::Name);
    assert_eq!(
        hits[0].symbol.fhir_path.as_deref(),
        Some("Patient.name.given")
    );
    assert_eq!(hits[0].symbol.container_name.as_deref(), Some("Patient.name"));

    let functions = SearchOptions::default().with_kind(SymbolKind::Function);
    let hits = service.search("first", Some(&functions));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol.kind, SymbolKind::Function);
}

#[tokio::test]
async fn sync_indexing_matches_worker_pool() {
    let dir = workspace();
    let pooled = service();
    let sequential = service();
    pooled
        .index_workspace(dir.path(), &CancellationFlag::new())
        .await;
    sequential.index_workspace_sync(dir.path()).await;

    assert_eq!(pooled.index().stats(), sequential.index().stats());
}
