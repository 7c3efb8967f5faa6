mod common;

use common::{messages, node, state};
use octofhir_validator::validators::{
    CardinalityValidator, ChildrenValidator, TypeLabelValidator,
};
use octofhir_validator::*;
use serde_json::json;
use std::sync::Arc;

fn group(count: usize) -> Vec<Arc<ElementNode>> {
    (0..count).map(|_| node("given")).collect()
}

#[tokio::test]
async fn test_cardinality_bounds() {
    let rule = Assertion::Cardinality(CardinalityValidator::new(Some(2), Some(3)).unwrap());
    let context = ValidationContext::new();

    for count in [2, 3] {
        let report = rule.validate_many(&group(count), &context, &state()).await.unwrap();
        assert!(report.is_plain_success(), "count {count} should pass");
    }
    for count in [1, 4] {
        let report = rule.validate_many(&group(count), &context, &state()).await.unwrap();
        assert!(report.is_failure(), "count {count} should fail");
        assert!(report.has_issue(IssueCode::CardinalityViolation));
    }
}

#[test]
fn test_cardinality_construction_errors() {
    assert!(matches!(
        CardinalityValidator::new(Some(-1), None),
        Err(ValidationError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        CardinalityValidator::new(Some(3), Some(2)),
        Err(ValidationError::InvalidConfiguration { .. })
    ));
    assert!(CardinalityValidator::from_fhir(Some(0), Some("*")).is_ok());
}

fn abc() -> Arc<ElementNode> {
    ElementNode::new("root")
        .with_child(ElementNode::new("a"))
        .with_child(ElementNode::new("b"))
        .with_child(ElementNode::new("c"))
        .into_shared()
}

fn declared(allow_additional: bool) -> Assertion {
    let any = || Assertion::Result(validators::ResultAssertion::SUCCESS);
    Assertion::Children(ChildrenValidator::new([("a", any()), ("b", any())], allow_additional))
}

#[tokio::test]
async fn test_unknown_children_are_named() {
    let report = declared(false)
        .validate_one(&abc(), &ValidationContext::new(), &state())
        .await
        .unwrap();
    assert!(report.is_failure());
    let unknown = report.issues_with_code(IssueCode::UnknownChild);
    assert_eq!(unknown.len(), 1);
    assert!(unknown[0].message.contains("'c'"));
}

#[tokio::test]
async fn test_additional_children_allowed() {
    let report = declared(true)
        .validate_one(&abc(), &ValidationContext::new(), &state())
        .await
        .unwrap();
    assert!(report.is_plain_success());
}

#[tokio::test]
async fn test_choice_type_children() {
    let children = Assertion::Children(ChildrenValidator::new(
        [(
            "value[x]",
            Assertion::TypeLabel(TypeLabelValidator::new("Quantity")),
        )],
        false,
    ));
    let observation = ElementNode::resource("Observation")
        .with_child(ElementNode::new("value").with_type("string").with_value("high"))
        .into_shared();

    let report = children
        .validate_one(&observation, &ValidationContext::new(), &ValidationState::new("Observation"))
        .await
        .unwrap();
    assert!(report.is_failure());
    assert_eq!(
        report.issues()[0].location,
        "Observation.value.ofType(string)"
    );
}

#[tokio::test]
async fn test_single_rule_over_group_is_an_error() {
    let rule = Assertion::TypeLabel(TypeLabelValidator::new("string"));
    let context = ValidationContext::new();

    let empty = rule.validate_many(&[], &context, &state()).await.unwrap();
    assert!(empty.is_plain_success());

    let err = rule
        .validate_many(&group(2), &context, &state())
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::GroupShapeMismatch { count: 2, .. }));
}

#[tokio::test]
async fn test_schema_applies_single_rules_per_element() {
    let schema = ElementSchema::new(
        "#given",
        vec![
            Assertion::Cardinality(CardinalityValidator::new(Some(1), None).unwrap()),
            Assertion::TypeLabel(TypeLabelValidator::new("string")),
        ],
    );
    let nodes = vec![
        ElementNode::primitive("given", "string", "Jan").into_shared(),
        ElementNode::primitive("given", "integer", 3).into_shared(),
    ];

    let report = schema
        .validate_many(&nodes, &ValidationContext::new(), &ValidationState::new("given"))
        .await
        .unwrap();
    assert!(report.is_failure());
    let issues = report.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].location, "given[1]");
}

#[tokio::test]
async fn test_primitive_value_is_exposed_as_child() {
    let active = ElementNode::from_json(&json!({"resourceType": "Patient", "active": true}));
    let boolean = Assertion::Children(ChildrenValidator::new(
        [(
            "active",
            Assertion::Children(ChildrenValidator::new(
                [("value", Assertion::TypeLabel(TypeLabelValidator::new("System.Boolean")))],
                false,
            )),
        )],
        true,
    ));

    let report = boolean
        .validate_one(&active, &ValidationContext::new(), &ValidationState::new("Patient"))
        .await
        .unwrap();
    assert!(report.is_plain_success(), "{:?}", messages(&report));
}
