use crate::canonical::Canonical;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::terminology::{BindingStrength, CodeMembership};
use crate::validators::{IssueAssertion, TraceAssertion};
use std::sync::Arc;
use tracing::{debug, warn};

/// Coded values must come from a value set
#[derive(Debug, Clone, PartialEq)]
pub struct BindingValidator {
    value_set: Canonical,
    strength: BindingStrength,
}

impl BindingValidator {
    pub fn new(value_set: impl Into<Canonical>, strength: BindingStrength) -> Self {
        Self {
            value_set: value_set.into(),
            strength,
        }
    }

    pub fn value_set(&self) -> &Canonical {
        &self.value_set
    }

    pub fn strength(&self) -> BindingStrength {
        self.strength
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        if !self.strength.is_checked() {
            return Ok(ResultReport::success());
        }
        let Some(service) = context.terminology() else {
            return Ok(TraceAssertion::when_enabled(
                context,
                state,
                format!("Binding to {} not checked: no terminology service", self.value_set),
            ));
        };

        let codes = extract_codes(input);
        if codes.is_empty() {
            return Ok(ResultReport::success());
        }

        let mut reasons = Vec::new();
        for (code, system) in &codes {
            match service
                .validate_code(self.value_set.as_str(), code, system.as_deref())
                .await
            {
                Ok(CodeMembership::Member) => return Ok(ResultReport::success()),
                Ok(CodeMembership::NotMember { reason }) => {
                    debug!(code, value_set = %self.value_set, "code not in value set");
                    reasons.extend(reason);
                }
                Err(err) => {
                    warn!(error = %err, value_set = %self.value_set, "terminology service failed");
                    return Ok(IssueAssertion::new(
                        IssueCode::TerminologyUnavailable,
                        format!("Could not check binding to {}: {err}", self.value_set),
                    )
                    .with_severity(context.config.terminology_failure.severity())
                    .as_result(state));
                }
            }
        }

        let rendered: Vec<String> = codes
            .iter()
            .map(|(code, system)| match system {
                Some(system) => format!("{system}#{code}"),
                None => code.clone(),
            })
            .collect();
        let mut message = format!(
            "None of the codes provided ({}) are in the value set '{}' ({} binding)",
            rendered.join(", "),
            self.value_set,
            self.strength
        );
        if !reasons.is_empty() {
            message.push_str(&format!(": {}", reasons.join("; ")));
        }
        let code = if self.strength.is_error_on_failure() {
            IssueCode::BindingViolation
        } else {
            IssueCode::ExtensibleBindingViolation
        };
        Ok(IssueAssertion::new(code, message).as_result(state))
    }
}

/// `(code, system)` pairs carried by a code, Coding, CodeableConcept or Quantity
fn extract_codes(node: &ElementNode) -> Vec<(String, Option<String>)> {
    if let Some(code) = node.value_str() {
        return vec![(code.to_string(), None)];
    }
    let codings: Vec<&Arc<ElementNode>> = node.children_named("coding").collect();
    if !codings.is_empty() {
        return codings
            .into_iter()
            .filter_map(|c| coding_pair(c))
            .collect();
    }
    coding_pair(node).into_iter().collect()
}

fn coding_pair(node: &ElementNode) -> Option<(String, Option<String>)> {
    let code = node.child_str("code")?;
    Some((code.to_string(), node.child_str("system").map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceFailurePolicy, ValidationConfig};
    use crate::terminology::InMemoryTerminologyService;

    const VS: &str = "http://hl7.org/fhir/ValueSet/observation-status";

    fn context() -> ValidationContext {
        let service = InMemoryTerminologyService::new()
            .with_code(VS, "final", Some("http://hl7.org/fhir/observation-status"));
        ValidationContext::new().with_terminology_service(Arc::new(service))
    }

    fn concept(codes: &[&str]) -> Arc<ElementNode> {
        let mut node = ElementNode::new("code").with_type("CodeableConcept");
        for code in codes {
            node = node.with_child(
                ElementNode::new("coding")
                    .with_child(ElementNode::primitive(
                        "system",
                        "uri",
                        "http://hl7.org/fhir/observation-status",
                    ))
                    .with_child(ElementNode::primitive("code", "code", *code)),
            );
        }
        Arc::new(node)
    }

    #[tokio::test]
    async fn test_required_binding() {
        let rule = BindingValidator::new(VS, BindingStrength::Required);
        let state = ValidationState::new("Observation").with_child("status");

        let ok = Arc::new(ElementNode::primitive("status", "code", "final"));
        assert!(rule.validate_one(&ok, &context(), &state).await.unwrap().is_successful());

        let bad = Arc::new(ElementNode::primitive("status", "code", "bogus"));
        let report = rule.validate_one(&bad, &context(), &state).await.unwrap();
        assert!(report.has_issue(IssueCode::BindingViolation));
        assert!(report.is_failure());
    }

    #[tokio::test]
    async fn test_any_coding_satisfies_concept() {
        let rule = BindingValidator::new(VS, BindingStrength::Extensible);
        let state = ValidationState::new("Observation").with_child("code");

        let report = rule
            .validate_one(&concept(&["bogus", "final"]), &context(), &state)
            .await
            .unwrap();
        assert!(report.is_plain_success());

        let report = rule
            .validate_one(&concept(&["bogus"]), &context(), &state)
            .await
            .unwrap();
        assert!(report.is_successful());
        assert!(report.has_issue(IssueCode::ExtensibleBindingViolation));
    }

    #[tokio::test]
    async fn test_service_failure_policy() {
        let rule = BindingValidator::new("http://example.org/unknown-vs", BindingStrength::Required);
        let state = ValidationState::new("Observation");
        let node = Arc::new(ElementNode::primitive("status", "code", "final"));

        let report = rule.validate_one(&node, &context(), &state).await.unwrap();
        assert!(report.is_successful());
        assert!(report.has_issue(IssueCode::TerminologyUnavailable));

        let strict = context().with_config(
            ValidationConfig::new().with_terminology_failure(ServiceFailurePolicy::Error),
        );
        let report = rule.validate_one(&node, &strict, &state).await.unwrap();
        assert!(report.is_failure());
    }

    #[tokio::test]
    async fn test_unchecked_strengths() {
        let rule = BindingValidator::new(VS, BindingStrength::Example);
        let state = ValidationState::new("Observation");
        let node = Arc::new(ElementNode::primitive("status", "code", "bogus"));
        assert!(rule.validate_one(&node, &context(), &state).await.unwrap().is_plain_success());
    }
}
