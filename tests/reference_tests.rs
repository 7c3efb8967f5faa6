mod common;

use common::{reference_context, reference_rule, schema_for};
use octofhir_validator::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

async fn validate(context: &ValidationContext, resource: &Arc<ElementNode>) -> (ResultReport, usize) {
    common::init_tracing();
    let schema = schema_for(context, resource.name()).await;
    let state = ValidationState::new(resource.name());
    let report = schema.validate_one(resource, context, &state).await.unwrap();
    (report, state.run().resources_validated())
}

#[tokio::test]
async fn test_mutually_referencing_contained_resources() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "contained": [
            { "resourceType": "Organization", "id": "o1", "partOf": { "reference": "#o2" } },
            { "resourceType": "Organization", "id": "o2", "partOf": { "reference": "#o1" } }
        ],
        "managingOrganization": { "reference": "#o1" }
    }));

    let (report, _) = validate(&reference_context(), &patient).await;

    assert!(report.is_successful());
    let cycles = report.issues_with_code(IssueCode::ReferenceCycleDetected);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, Severity::Warning);
    assert_eq!(report.issues().len(), 1);
}

#[tokio::test]
async fn test_external_round_trip_cycle() {
    let p1 = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "id": "p1",
        "link": [{ "reference": "Patient/p2" }]
    }));
    let p2 = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "id": "p2",
        "link": [{ "reference": "Patient/p1" }]
    }));
    let store = InMemoryReferenceResolver::new()
        .with_resource("Patient/p1", Arc::clone(&p1))
        .with_resource("Patient/p2", Arc::clone(&p2));
    let context = reference_context().with_reference_resolver(Arc::new(store));

    let (report, _) = validate(&context, &p1).await;

    assert!(report.is_successful());
    assert_eq!(report.issues_with_code(IssueCode::ReferenceCycleDetected).len(), 1);
}

#[tokio::test]
async fn test_resource_referenced_twice_is_not_a_cycle() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "contained": [{ "resourceType": "Organization", "id": "o1" }],
        "managingOrganization": { "reference": "#o1" },
        "generalPractitioner": [{ "reference": "#o1" }]
    }));

    let (report, resources) = validate(&reference_context(), &patient).await;

    assert!(report.is_plain_success());
    assert!(!report.has_issue(IssueCode::ReferenceCycleDetected));
    // The patient and the organization, the second visit reuses the first
    assert_eq!(resources, 2);
}

#[tokio::test]
async fn test_repeated_failure_is_reused() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "contained": [{ "resourceType": "Organization", "id": "o1", "partOf": { "reference": "#missing" } }],
        "managingOrganization": { "reference": "#o1" },
        "generalPractitioner": [{ "reference": "#o1" }]
    }));

    let (report, _) = validate(&reference_context(), &patient).await;

    assert!(report.is_failure());
    assert_eq!(report.issues_with_code(IssueCode::ReferenceNotResolvable).len(), 1);
}

#[tokio::test]
async fn test_bundled_reference() {
    let bundle = ElementNode::from_json(&json!({
        "resourceType": "Bundle",
        "entry": [
            {
                "fullUrl": "http://example.org/fhir/Patient/p1",
                "resource": {
                    "resourceType": "Patient",
                    "id": "p1",
                    "managingOrganization": { "reference": "Organization/o1" }
                }
            },
            {
                "fullUrl": "http://example.org/fhir/Organization/o1",
                "resource": { "resourceType": "Organization", "id": "o1" }
            }
        ]
    }));

    let (report, resources) = validate(&reference_context(), &bundle).await;

    assert!(report.is_plain_success());
    assert_eq!(resources, 3);
}

#[tokio::test]
async fn test_unresolvable_contained_reference() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "managingOrganization": { "reference": "#nowhere" }
    }));

    let (report, _) = validate(&reference_context(), &patient).await;

    assert!(report.is_failure());
    let issues = report.issues_with_code(IssueCode::ReferenceNotResolvable);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].location, "Patient.managingOrganization");
}

#[tokio::test]
async fn test_unparseable_reference() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "managingOrganization": { "reference": "not a reference" }
    }));

    let (report, _) = validate(&reference_context(), &patient).await;
    assert!(report.is_failure());
    assert!(report.has_issue(IssueCode::UnparseableReference));
}

#[tokio::test]
async fn test_external_reference_without_resolver_is_skipped() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "managingOrganization": { "reference": "Organization/elsewhere" }
    }));

    let (report, _) = validate(&reference_context(), &patient).await;
    assert!(report.is_plain_success());
}

#[tokio::test]
async fn test_unknown_external_reference_is_a_warning() {
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "managingOrganization": { "reference": "Organization/elsewhere" }
    }));
    let context =
        reference_context().with_reference_resolver(Arc::new(InMemoryReferenceResolver::new()));

    let (report, _) = validate(&context, &patient).await;
    assert!(report.is_successful());
    assert!(report.has_issue(IssueCode::ExternalReferenceUnavailable));
}

#[tokio::test]
async fn test_external_target_gets_its_own_location_scope() {
    let organization = ElementNode::from_json(&json!({
        "resourceType": "Organization",
        "partOf": { "reference": "#missing" }
    }));
    let resolver = FnReferenceResolver::new(move |reference: &str, source: &str| {
        assert_eq!(source, "Patient.managingOrganization");
        Ok((reference == "Organization/o1").then(|| Arc::clone(&organization)))
    });
    let patient = ElementNode::from_json(&json!({
        "resourceType": "Patient",
        "managingOrganization": { "reference": "Organization/o1" }
    }));
    let context = reference_context().with_reference_resolver(Arc::new(resolver));

    let (report, _) = validate(&context, &patient).await;

    assert!(report.is_failure());
    assert!(matches!(report.evidence()[0], Evidence::Report(_)));
    assert_eq!(report.issues()[0].location, "Organization/o1.partOf");
}

fn referencing(reference: &str) -> Arc<ElementNode> {
    ElementNode::new("subject")
        .with_type("Reference")
        .with_child(ElementNode::primitive("reference", "string", reference))
        .into_shared()
}

#[tokio::test]
async fn test_aggregation_rules() {
    let context = reference_context();
    let state = ValidationState::new("Observation").with_child("subject");
    let contained_only = Assertion::Reference(
        reference_rule().with_aggregation_rules([reference::AggregationMode::Contained]),
    );

    let report = contained_only
        .validate_one(&referencing("Patient/p1"), &context, &state)
        .await
        .unwrap();
    assert!(report.is_failure());
    let issues = report.issues_with_code(IssueCode::InvalidAggregation);
    assert_eq!(issues.len(), 1);
    assert!(issues[0].message.contains("referenced"));

    let any_external = Assertion::Reference(reference_rule().with_aggregation_rules([
        reference::AggregationMode::Bundled,
        reference::AggregationMode::Referenced,
    ]));
    let report = any_external
        .validate_one(&referencing("Patient/p1"), &context, &state)
        .await
        .unwrap();
    assert!(report.is_plain_success());
}

#[tokio::test]
async fn test_versioning_rules() {
    let context = reference_context();
    let state = ValidationState::new("Observation").with_child("subject");
    let specific = Assertion::Reference(
        reference_rule().with_versioning_rule(ReferenceVersioning::Specific),
    );

    let report = specific
        .validate_one(&referencing("Patient/p1"), &context, &state)
        .await
        .unwrap();
    assert!(report.has_issue(IssueCode::InvalidVersioning));

    let report = specific
        .validate_one(&referencing("Patient/p1/_history/2"), &context, &state)
        .await
        .unwrap();
    assert!(report.is_plain_success());

    let independent = Assertion::Reference(
        reference_rule().with_versioning_rule(ReferenceVersioning::Independent),
    );
    let report = independent
        .validate_one(&referencing("Patient/p1/_history/2"), &context, &state)
        .await
        .unwrap();
    assert!(report.is_failure());
}

#[tokio::test]
async fn test_canonical_typed_reference_uses_own_value() {
    let rule = Assertion::Reference(reference_rule());
    let node = ElementNode::primitive("instantiatesCanonical", "canonical", "#nope").into_shared();
    let report = rule
        .validate_one(&node, &reference_context(), &ValidationState::new("Task"))
        .await
        .unwrap();
    assert!(report.has_issue(IssueCode::ReferenceNotResolvable));
}

fn organization(id: &str, part_of: &str) -> Arc<ElementNode> {
    ElementNode::from_json(&json!({
        "resourceType": "Organization",
        "id": id,
        "partOf": { "reference": part_of }
    }))
}

#[tokio::test]
async fn test_cycle_through_element_schema_target() {
    common::init_tracing();
    let org_schema = ElementSchema::new(
        "urn:org",
        vec![Assertion::Children(validators::ChildrenValidator::new(
            [(
                "partOf",
                Assertion::Reference(validators::ReferencedInstanceValidator::new(
                    Assertion::SchemaReference(validators::SchemaReferenceValidator::new(
                        "urn:org",
                    )),
                )),
            )],
            true,
        ))],
    );
    let a = organization("a", "Organization/b");
    let b = organization("b", "Organization/a");
    let store = InMemoryReferenceResolver::new()
        .with_resource("Organization/a", Arc::clone(&a))
        .with_resource("Organization/b", Arc::clone(&b));
    let context = ValidationContext::new()
        .with_schema_resolver(Arc::new(
            InMemorySchemaResolver::new().with_schema(org_schema.clone()),
        ))
        .with_reference_resolver(Arc::new(store));

    let report = Validator::new(context)
        .validate_one(&org_schema, &a)
        .await
        .unwrap();

    assert!(report.is_successful());
    let cycles = report.issues_with_code(IssueCode::ReferenceCycleDetected);
    assert_eq!(cycles.len(), 1);
    assert_eq!(report.issues().len(), 1);
}
