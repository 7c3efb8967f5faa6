use crate::context::ValidationContext;
use crate::issue::{IssueCode, Severity};
use crate::report::{Evidence, ResultReport, TraceNote, ValidationIssue, ValidationOutcome};
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use std::sync::Arc;

/// Rule with a fixed outcome, regardless of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultAssertion {
    outcome: ValidationOutcome,
}

impl ResultAssertion {
    pub const SUCCESS: ResultAssertion = ResultAssertion {
        outcome: ValidationOutcome::Success,
    };
    pub const FAILURE: ResultAssertion = ResultAssertion {
        outcome: ValidationOutcome::Failure,
    };
    pub const UNDECIDED: ResultAssertion = ResultAssertion {
        outcome: ValidationOutcome::Undecided,
    };

    pub fn new(outcome: ValidationOutcome) -> Self {
        Self { outcome }
    }

    pub fn outcome(&self) -> ValidationOutcome {
        self.outcome
    }

    pub fn report(&self) -> ResultReport {
        ResultReport::new(self.outcome, Vec::new())
    }
}

/// Rule that raises one issue for every node it sees.
///
/// Also the building block every other rule uses to report a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueAssertion {
    code: IssueCode,
    severity: Severity,
    message: String,
}

impl IssueAssertion {
    /// Issue with the code's default severity
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn code(&self) -> IssueCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_issue(&self, state: &ValidationState) -> ValidationIssue {
        ValidationIssue {
            severity: self.severity,
            code: self.code,
            message: self.message.clone(),
            location: state.instance_location().to_string(),
            definition_path: state.definition_path().to_string(),
        }
    }

    /// Errors fail; warnings and information succeed with evidence
    pub fn as_result(&self, state: &ValidationState) -> ResultReport {
        ResultReport::from_issue(self.to_issue(state))
    }
}

/// Rule leaving a note without judging the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceAssertion {
    message: String,
}

impl TraceAssertion {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn report(&self, state: &ValidationState) -> ResultReport {
        ResultReport::new(
            ValidationOutcome::Success,
            vec![Evidence::Trace(TraceNote {
                message: self.message.clone(),
                location: state.instance_location().to_string(),
            })],
        )
    }

    /// Trace that only appears when the run asked for traces
    pub(crate) fn when_enabled(
        context: &ValidationContext,
        state: &ValidationState,
        message: impl Into<String>,
    ) -> ResultReport {
        if context.config.trace {
            TraceAssertion::new(message).report(state)
        } else {
            ResultReport::success()
        }
    }
}

/// Local registry of named sub-schemas; never evaluated
#[derive(Debug, Clone, Default)]
pub struct DefinitionsAssertion {
    schemas: Vec<Arc<ElementSchema>>,
}

impl DefinitionsAssertion {
    pub fn new(schemas: impl IntoIterator<Item = ElementSchema>) -> Self {
        Self {
            schemas: schemas.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn schemas(&self) -> &[Arc<ElementSchema>] {
        &self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_severity_maps_outcome() {
        let state = ValidationState::new("Patient").with_child("name");
        let error = IssueAssertion::new(IssueCode::UnknownChild, "unknown");
        let warning = error.clone().with_severity(Severity::Warning);

        let report = error.as_result(&state);
        assert!(report.is_failure());
        assert_eq!(report.issues()[0].location, "Patient.name");

        assert!(warning.as_result(&state).is_successful());
    }

    #[test]
    fn test_trace_respects_config() {
        let state = ValidationState::new("Patient");
        let quiet = ValidationContext::new();
        assert!(TraceAssertion::when_enabled(&quiet, &state, "skipped").is_plain_success());

        let mut verbose = ValidationContext::new();
        verbose.config.trace = true;
        let report = TraceAssertion::when_enabled(&verbose, &state, "skipped");
        assert!(report.is_successful());
        assert_eq!(report.evidence().len(), 1);
    }
}
