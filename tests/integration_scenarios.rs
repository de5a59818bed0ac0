//! End-to-end scenarios through the service facade and the navigator
//!
//! Uses the bundled FHIR R4 core types unless a test builds its own schema.

use octofhir_fhirpath_intellisense::cache::{CacheConfig, ResultCache};
use octofhir_fhirpath_intellisense::completion::CompletionKind;
use octofhir_fhirpath_intellisense::diagnostics::{DiagnosticCode, Severity};
use octofhir_fhirpath_intellisense::model::{ElementDefinition, InMemoryTypeProvider, TypeInfo};
use octofhir_fhirpath_intellisense::navigator::{
    capitalize, extract_base_property, extract_choice_type, get_choice_property_names,
    is_choice_property, resolve_choice_types,
};
use octofhir_fhirpath_intellisense::{Config, IntellisenseService, TypeNavigator};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

fn core_navigator() -> TypeNavigator {
    TypeNavigator::new(
        Arc::new(InMemoryTypeProvider::fhir_r4_core()),
        CacheConfig::default(),
    )
}

fn service() -> IntellisenseService {
    IntellisenseService::new(
        Arc::new(InMemoryTypeProvider::fhir_r4_core()),
        Config::default(),
    )
}

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn scenario_a_patient_name_resolves_to_human_name() {
    let provider = InMemoryTypeProvider::from_types([
        TypeInfo::primitive("string"),
        TypeInfo::complex("HumanName").with_element("family", ElementDefinition::single("string")),
        TypeInfo::resource("Patient").with_element("name", ElementDefinition::many("HumanName")),
    ]);
    let navigator = TypeNavigator::new(Arc::new(provider), CacheConfig::default());

    let result = navigator
        .navigate_property_path("Patient", &path(&["name"]))
        .await;
    assert!(result.is_valid);
    assert_eq!(result.final_type.as_ref().unwrap().name(), "HumanName");
}

#[test]
fn scenario_b_choice_property_names_follow_declaration_order() {
    let choices = vec![
        Arc::new(TypeInfo::primitive("string")),
        Arc::new(TypeInfo::complex("Quantity")),
        Arc::new(TypeInfo::primitive("boolean")),
    ];
    assert_eq!(
        get_choice_property_names("value", &choices),
        vec!["valueString", "valueQuantity", "valueBoolean"]
    );
}

#[tokio::test]
async fn scenario_c_misspelled_choice_property_gets_suggestion() {
    let validation = core_navigator()
        .validate_choice_property("Observation", "valueIntger")
        .await;
    assert!(!validation.is_valid);
    assert_eq!(validation.suggested_property.as_deref(), Some("valueInteger"));
}

#[tokio::test]
async fn scenario_d_completion_filters_by_current_token() {
    let candidates = service().complete("Patient.na", 10).await;
    let labels: Vec<_> = candidates.iter().map(|c| c.label.as_str()).collect();
    assert!(labels.contains(&"name"));
    assert!(!labels.contains(&"birthDate"));
    assert_eq!(candidates[0].kind, CompletionKind::Property);
}

#[rstest]
#[case("Patient", &["name"], "HumanName")]
#[case("Patient", &["name", "given"], "string")]
#[case("Patient", &["id"], "id")]
#[case("Observation", &["code", "coding", "system"], "uri")]
#[case("Observation", &["valueQuantity", "unit"], "string")]
#[tokio::test]
async fn valid_paths_reach_declared_leaf(
    #[case] root: &str,
    #[case] segments: &[&str],
    #[case] leaf: &str,
) {
    let result = core_navigator().resolve_path(root, &path(segments)).await;
    assert!(result.is_valid, "{root}.{}", segments.join("."));
    assert_eq!(result.final_type.as_ref().unwrap().name(), leaf);
    assert_eq!(result.navigation_path.len(), segments.len() + 1);
}

#[tokio::test]
async fn invalid_segment_lists_exact_siblings() {
    let navigator = core_navigator();
    let human_name = navigator.get_enhanced_type("HumanName").await.unwrap();
    let mut expected: Vec<String> = navigator
        .members(&human_name.type_info)
        .await
        .iter()
        .map(|m| m.name.clone())
        .collect();

    let result = navigator
        .navigate_property_path("Patient", &path(&["name", "famly"]))
        .await;
    assert!(!result.is_valid);
    assert_eq!(result.failed_segment, Some(1));
    assert_eq!(result.suggestion.as_deref(), Some("family"));

    let mut available = result.available_properties.clone();
    available.sort();
    expected.sort();
    let mut deduped = available.clone();
    deduped.dedup();
    assert_eq!(available, deduped);
    assert_eq!(available, expected);
}

#[rstest]
#[case("valueQuantity")]
#[case("valueString")]
#[case("effectiveDateTime")]
#[case("multipleBirthBoolean")]
fn choice_names_round_trip(#[case] name: &str) {
    assert!(is_choice_property(name));
    let base = extract_base_property(name).unwrap();
    let choice_type = extract_choice_type(name).unwrap();
    assert_eq!(format!("{base}{}", capitalize(&choice_type)), name);
}

#[test]
fn non_choice_type_resolves_to_itself() {
    let quantity = Arc::new(TypeInfo::complex("Quantity"));
    let resolved = resolve_choice_types(&quantity, None);
    assert_eq!(resolved.len(), 1);
    assert!(Arc::ptr_eq(&resolved[0], &quantity));
}

#[test]
fn cache_respects_capacity_and_evicts_least_used() {
    let cache: ResultCache<u32, u32> = ResultCache::new("test", CacheConfig::new(10, Duration::from_secs(60)));
    for key in 0..10 {
        cache.set(key, key);
    }
    for key in 2..10 {
        assert_eq!(cache.get(&key), Some(key));
    }
    cache.set(10, 10);
    assert!(cache.len() <= 10);
    assert_eq!(cache.get(&0), None);
    assert_eq!(cache.get(&1), None);
    assert_eq!(cache.get(&10), Some(10));
}

#[tokio::test]
async fn diagnostics_flag_each_problem_once() {
    let document = "// @resource Patient\n\
                    name.famly\n\
                    Observation.valueIntger; Patient.gender[0]\n\
                    Patient.name.where(";
    let diagnostics = service().diagnose(document).await;
    let codes: Vec<_> = diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        vec![
            DiagnosticCode::PropertyNotFound,
            DiagnosticCode::InvalidChoiceProperty,
            DiagnosticCode::CardinalityMismatch,
            DiagnosticCode::SyntaxError,
        ]
    );

    let not_found = &diagnostics[0];
    assert_eq!(&document[not_found.range.start..not_found.range.end], "famly");
    assert_eq!(not_found.severity, Severity::Error);
    let fix = not_found.quick_fix.as_ref().unwrap();
    assert_eq!(fix.replacement, "family");
    assert_eq!(fix.range, not_found.range);
    assert_eq!(diagnostics[2].severity, Severity::Warning);
}

#[tokio::test]
async fn provider_outage_degrades_to_syntax_only() {
    let service = IntellisenseService::new(
        Arc::new(octofhir_fhirpath_intellisense::model::EmptyTypeProvider),
        Config::default(),
    );
    let candidates = service.complete("Patient.na", 10).await;
    assert!(candidates.iter().all(|c| c.kind != CompletionKind::Property));
    assert!(service.diagnose("Patient.nme").await.is_empty());
}
