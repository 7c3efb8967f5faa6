use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use std::sync::Arc;

/// The node's runtime type label must match.
///
/// Nodes without a type label pass; the instance source could not tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLabelValidator {
    label: String,
}

impl TypeLabelValidator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        match input.instance_type() {
            Some(actual) if actual != self.label => IssueAssertion::new(
                IssueCode::WrongType,
                format!(
                    "The declared type of the element ({}) is incompatible with that of the instance ({actual})",
                    self.label
                ),
            )
            .as_result(state),
            _ => ResultReport::success(),
        }
    }
}
