mod common;

use common::{FailingSource, fixture_source, load_bundle};
use octofhir_fhirrules::*;
use serde_json::json;
use std::sync::Arc;

fn paths(issues: &[SpecHintIssue]) -> Vec<&str> {
    issues.iter().map(|issue| issue.path.as_str()).collect()
}

#[tokio::test]
async fn test_empty_bundle_yields_no_issues() {
    let service = SpecHintService::embedded();
    let bundle = JsonBundle::from_value(json!({"resourceType": "Bundle", "entry": []}));

    for version in ["R4", "R4B", "R5"] {
        assert!(service.check(&bundle, version).await.is_empty());
    }
}

#[tokio::test]
async fn test_single_missing_field() {
    let service = SpecHintService::embedded();
    let bundle = JsonBundle::from_value(json!({
        "resourceType": "Bundle",
        "type": "collection",
        "entry": [{
            "resource": {
                "resourceType": "Encounter",
                "status": "completed",
                "subject": {"reference": "Patient/1"},
                "type": [{"text": "Consultation"}],
                "actualPeriod": {"start": "2024-03-01"}
            }
        }]
    }));

    let issues = service.check(&bundle, "R5").await;

    assert_eq!(issues.len(), 1);
    let issue = &issues[0];
    assert_eq!(issue.resource_type, "Encounter");
    assert_eq!(issue.path, "Encounter.class");
    assert_eq!(issue.severity, IssueSeverity::Warning);
    assert!(issue.reason.contains("R5"), "{}", issue.reason);
    assert!(issue.reason.contains("Encounter.class"), "{}", issue.reason);
}

#[tokio::test]
async fn test_unsupported_version_yields_no_issues() {
    let service = SpecHintService::embedded();
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    assert!(service.check(&bundle, "R6").await.is_empty());
    assert!(service.check(&bundle, "3.0.2").await.is_empty());
    assert!(service.check(&bundle, "not-a-version").await.is_empty());
}

#[tokio::test]
async fn test_mixed_bundle_order_and_entry_indices() {
    let service = SpecHintService::embedded();
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    let issues = service.check(&bundle, "R5").await;

    assert_eq!(
        paths(&issues),
        vec![
            "Patient.birthDate",
            "Encounter.class",
            "Observation.category",
            "Observation.performer"
        ]
    );
    let indices: Vec<usize> = issues.iter().map(|issue| issue.entry_index).collect();
    assert_eq!(indices, vec![0, 1, 3, 3]);
    assert!(
        issues
            .iter()
            .all(|issue| issue.severity == IssueSeverity::Warning)
    );
}

#[tokio::test]
async fn test_version_changes_expectations() {
    let service = SpecHintService::embedded();
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    let r4 = service.check(&bundle, "4.0.1").await;

    // R4 expects Encounter.period instead of the R5 class/actualPeriod pair
    assert_eq!(
        paths(&r4),
        vec![
            "Patient.birthDate",
            "Encounter.period",
            "Observation.category",
            "Observation.performer"
        ]
    );
    assert!(r4.iter().all(|issue| issue.reason.contains("R4")));
}

#[tokio::test]
async fn test_repeated_checks_are_deterministic() {
    let service = SpecHintService::embedded();
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    let first = service.check(&bundle, "R5").await;
    for _ in 0..5 {
        assert_eq!(service.check(&bundle, "R5").await, first);
    }
}

#[tokio::test]
async fn test_parallel_and_sequential_agree() {
    let mut entries = Vec::new();
    for i in 0..40 {
        let resource = if i % 2 == 0 {
            json!({"resourceType": "Patient", "id": format!("p{i}"), "gender": "female"})
        } else {
            json!({"resourceType": "Condition", "id": format!("c{i}"), "code": {"text": "Asthma"}})
        };
        entries.push(json!({"resource": resource}));
    }
    let bundle = JsonBundle::from_value(json!({"resourceType": "Bundle", "entry": entries}));

    let sequential = SpecHintService::embedded()
        .with_config(SpecHintConfig::sequential())
        .check(&bundle, "R4")
        .await;
    let parallel = SpecHintService::embedded()
        .with_config(SpecHintConfig {
            max_concurrency: 8,
            ..Default::default()
        })
        .check(&bundle, "R4")
        .await;

    assert_eq!(sequential, parallel);
    // Patient: identifier, name, birthDate; Condition: clinicalStatus, verificationStatus, onset[x]
    assert_eq!(sequential.len(), 20 * 3 + 20 * 3);
    let indices: Vec<usize> = sequential.iter().map(|issue| issue.entry_index).collect();
    let mut sorted = indices.clone();
    sorted.sort();
    assert_eq!(indices, sorted);
}

#[tokio::test]
async fn test_multiple_missing_fields_each_reported() {
    let service = SpecHintService::embedded();
    let bundle = JsonBundle::from_value(json!({"resourceType": "Patient"}));

    let issues = service.check(&bundle, "R4").await;
    assert_eq!(
        paths(&issues),
        vec![
            "Patient.identifier",
            "Patient.name",
            "Patient.gender",
            "Patient.birthDate"
        ]
    );
}

#[tokio::test]
async fn test_choice_paths_accept_any_variant() {
    let service = SpecHintService::embedded();
    let bundle = JsonBundle::from_value(json!({
        "resourceType": "Condition",
        "clinicalStatus": {"text": "active"},
        "verificationStatus": {"text": "confirmed"},
        "code": {"text": "Asthma"},
        "onsetAge": {"value": 12, "unit": "a"}
    }));

    assert!(service.check(&bundle, "R4").await.is_empty());
}

#[tokio::test]
async fn test_schema_resolver_filters_undeclared_paths() {
    let resolver = Arc::new(SchemaResolver::new(fixture_source()));
    let service = SpecHintService::embedded().with_schema_resolver(resolver);
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    // The fixture Encounter declares actualPeriod but not period
    let r4 = service.check(&bundle, "R4").await;
    assert_eq!(
        paths(&r4),
        vec![
            "Patient.birthDate",
            "Observation.category",
            "Observation.performer"
        ]
    );

    let unchecked = SpecHintService::embedded()
        .with_schema_resolver(Arc::new(SchemaResolver::new(fixture_source())))
        .with_config(SpecHintConfig::default().with_schema_path_check(false))
        .check(&bundle, "R4")
        .await;
    assert_eq!(unchecked.len(), 4);
}

#[tokio::test]
async fn test_missing_schema_degrades_to_catalog_only() {
    let resolver = Arc::new(SchemaResolver::new(Arc::new(FailingSource)));
    let service = SpecHintService::embedded().with_schema_resolver(resolver);
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    let issues = service.check(&bundle, "R5").await;
    assert_eq!(issues, SpecHintService::embedded().check(&bundle, "R5").await);
}

#[tokio::test]
async fn test_custom_catalog_overlay() {
    let custom = SpecHintCatalog::from_json(
        r#"{
            "R5": {
                "Encounter": [
                    {"path": "serviceProvider", "reasonTemplate": "{field} routes claims"}
                ]
            }
        }"#,
    )
    .unwrap();
    let service = SpecHintService::new(Arc::new(SpecHintCatalog::embedded().merge(custom)));
    let bundle = JsonBundle::from_value(json!({
        "resourceType": "Encounter",
        "class": [{"text": "ambulatory"}],
        "subject": {"reference": "Patient/1"},
        "type": [{"text": "Consultation"}],
        "actualPeriod": {"start": "2024-03-01"}
    }));

    let issues = service.check(&bundle, "R5").await;
    assert_eq!(paths(&issues), vec!["Encounter.serviceProvider"]);
    assert_eq!(issues[0].reason, "serviceProvider routes claims (FHIR R5)");
}

#[tokio::test]
async fn test_issue_serialization_shape() {
    let service = SpecHintService::embedded();
    let bundle = JsonBundle::from_value(json!({
        "resourceType": "Practitioner",
        "name": [{"family": "Careful"}]
    }));

    let issues = service.check(&bundle, "R4B").await;
    let value = serde_json::to_value(&issues).unwrap();
    assert_eq!(value[0]["resourceType"], "Practitioner");
    assert_eq!(value[0]["path"], "Practitioner.identifier");
    assert_eq!(value[0]["severity"], "warning");
    assert_eq!(value[0]["entryIndex"], 0);
}

#[tokio::test]
async fn test_service_from_rules_config() {
    let config = RulesConfig::from_json(r#"{"fhirVersion": "5.0.0", "specHint": {"maxConcurrency": 2}}"#)
        .unwrap();
    let service = SpecHintService::from_config(Arc::new(SpecHintCatalog::embedded()), &config);
    let bundle = load_bundle("bundles/r5_mixed_bundle.json");

    let configured = service.check_configured(&bundle).await;
    assert_eq!(configured, service.check(&bundle, "R5").await);
    assert_eq!(configured, service.check_version(&bundle, FhirVersion::R5).await);
    assert!(paths(&configured).contains(&"Encounter.class"));
}

#[tokio::test]
async fn test_loaded_reasons_name_field_and_version() {
    let custom = SpecHintCatalog::from_json(
        r#"{"R5": {"Encounter": [{"path": "serviceProvider", "reasonTemplate": "{version} routing hint"}]}}"#,
    )
    .unwrap();
    let service = SpecHintService::new(Arc::new(custom));
    let bundle = JsonBundle::from_value(json!({"resourceType": "Encounter"}));

    let issues = service.check(&bundle, "R5").await;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].reason, "R5 routing hint (Encounter.serviceProvider)");
}

#[test]
fn test_catalog_version_aliases_are_rejected() {
    let doc = r#"{
        "R4": {"Patient": [{"path": "photo", "reasonTemplate": "{path} in {version}"}]},
        "r4": {"Patient": [{"path": "telecom", "reasonTemplate": "{path} in {version}"}]},
        "4.0": {"Patient": [{"path": "address", "reasonTemplate": "{path} in {version}"}]}
    }"#;

    for _ in 0..20 {
        let err = SpecHintCatalog::from_json(doc).unwrap_err();
        assert!(matches!(err, FhirRulesError::CatalogLoad { .. }));
    }
}
