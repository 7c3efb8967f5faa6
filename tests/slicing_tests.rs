mod common;

use common::{messages, succeeding};
use octofhir_validator::validators::{FixedValidator, SliceCase, SliceValidator};
use octofhir_validator::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn item(value: &str) -> Arc<ElementNode> {
    ElementNode::primitive("identifier", "string", value).into_shared()
}

fn items(values: &[&str]) -> Vec<Arc<ElementNode>> {
    values.iter().map(|v| item(v)).collect()
}

fn slice(name: &str) -> SliceCase {
    SliceCase::new(
        name,
        Assertion::Fixed(FixedValidator::new(json!(name))),
        common::repeating(&format!("#{name}"), succeeding(&format!("{name} validated"))),
    )
}

fn slicing(validator: SliceValidator) -> Assertion {
    Assertion::Slice(validator)
}

fn open_slicing() -> SliceValidator {
    SliceValidator::new(
        vec![slice("s1"), slice("s2")],
        succeeding("default validated"),
    )
}

async fn run(rule: &Assertion, values: &[&str]) -> ResultReport {
    rule.validate_many(
        &items(values),
        &ValidationContext::new(),
        &ValidationState::new("Patient").with_child("identifier"),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_every_bucket_validated_once() {
    let report = run(&slicing(open_slicing()), &["s1", "s2", "other"]).await;

    assert!(report.is_successful());
    assert_eq!(
        messages(&report),
        vec!["s1 validated", "s2 validated", "default validated"]
    );
}

#[tokio::test]
async fn test_ordered_slices_out_of_order() {
    let report = run(&slicing(open_slicing().ordered()), &["s2", "s1"]).await;

    assert!(report.is_failure());
    let out_of_order = report.issues_with_code(IssueCode::SliceOutOfOrder);
    assert_eq!(out_of_order.len(), 1);
    assert!(out_of_order[0].message.contains("out of order"));
    assert_eq!(out_of_order[0].location, "Patient.identifier[1]");

    let all = messages(&report);
    assert!(all.contains(&"s1 validated".to_string()));
    assert!(all.contains(&"s2 validated".to_string()));
}

#[tokio::test]
async fn test_ordered_slices_in_order() {
    let report = run(&slicing(open_slicing().ordered()), &["s1", "s1", "s2"]).await;
    assert!(report.is_successful());
    assert!(!report.has_issue(IssueCode::SliceOutOfOrder));
}

#[tokio::test]
async fn test_default_slice_must_be_at_end() {
    let report = run(&slicing(open_slicing().default_at_end()), &["s1", "other", "s2"]).await;

    assert!(report.is_failure());
    let violations = report.issues_with_code(IssueCode::SlicingRuleViolated);
    assert_eq!(violations.len(), 1);
    assert!(violations[0].message.contains("s2"));
}

#[tokio::test]
async fn test_default_at_end_accepts_trailing_unmatched() {
    let report = run(&slicing(open_slicing().default_at_end()), &["s1", "s2", "other"]).await;
    assert!(report.is_successful());
}

#[tokio::test]
async fn test_closed_slicing_rejects_each_unmatched_element() {
    let closed = slicing(SliceValidator::closed(vec![slice("s1")]));
    let report = run(&closed, &["s1", "x", "y"]).await;

    assert!(report.is_failure());
    assert_eq!(report.issues_with_code(IssueCode::SlicingUnmatched).len(), 2);
}

#[tokio::test]
async fn test_open_slicing_accepts_unmatched() {
    let open = slicing(SliceValidator::open(vec![slice("s1")]));
    let report = run(&open, &["x", "y"]).await;
    assert!(report.is_plain_success());
}

#[tokio::test]
async fn test_slice_issues_carry_slice_in_definition_path() {
    let failing_slice = SliceCase::new(
        "official",
        Assertion::Fixed(FixedValidator::new(json!("official"))),
        common::failing("official slice rejected"),
    );
    let rule = slicing(SliceValidator::open(vec![failing_slice]));
    let report = run(&rule, &["official"]).await;

    assert!(report.is_failure());
    assert!(report.issues()[0].definition_path.contains("official"));
}
