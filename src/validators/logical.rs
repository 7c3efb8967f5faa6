use crate::assertion::{Assertion, Input};
use crate::context::ValidationContext;
use crate::error::Result;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;

/// Every member must hold
#[derive(Debug, Clone)]
pub struct AllValidator {
    members: Vec<Assertion>,
    short_circuit: bool,
}

impl AllValidator {
    pub fn new(members: Vec<Assertion>) -> Self {
        Self {
            members,
            short_circuit: false,
        }
    }

    /// Stop at the first failing member
    pub fn short_circuit(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    pub fn members(&self) -> &[Assertion] {
        &self.members
    }

    pub fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    pub async fn validate(
        &self,
        input: Input<'_>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let mut reports = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let report = member.validate(input, context, state).await?;
            let failed = report.is_failure();
            reports.push(report);
            if failed && self.short_circuit {
                break;
            }
        }
        Ok(ResultReport::combine(reports))
    }
}

/// At least one member must hold
#[derive(Debug, Clone)]
pub struct AnyValidator {
    members: Vec<Assertion>,
    summary: Option<IssueAssertion>,
}

impl AnyValidator {
    pub fn new(members: Vec<Assertion>) -> Self {
        Self {
            members,
            summary: None,
        }
    }

    /// Issue reported in front of the member reports when nothing matched
    pub fn with_summary(mut self, summary: IssueAssertion) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn members(&self) -> &[Assertion] {
        &self.members
    }

    pub fn summary(&self) -> Option<&IssueAssertion> {
        self.summary.as_ref()
    }

    pub async fn validate(
        &self,
        input: Input<'_>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        if self.members.is_empty() {
            return Ok(ResultReport::success());
        }

        let mut reports = Vec::with_capacity(self.members.len() + 1);
        if let Some(summary) = &self.summary {
            reports.push(summary.as_result(state));
        }
        for member in &self.members {
            let report = member.validate(input, context, state).await?;
            if report.is_successful() {
                return Ok(report);
            }
            reports.push(report);
        }
        Ok(ResultReport::combine(reports))
    }
}
