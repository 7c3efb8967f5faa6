//! Outcome and evidence model.
//!
//! Every rule evaluation produces a [`ResultReport`]: a [`ValidationOutcome`]
//! plus the ordered [`Evidence`] that explains it. Reports from sibling rules
//! are merged with [`ResultReport::combine`], where the weakest outcome wins.

use crate::issue::{IssueCode, Severity};
use serde::Serialize;

/// Outcome of a validation, ordered from strongest to weakest.
///
/// Combining outcomes keeps the maximum: `Success < Undecided < Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    #[default]
    Success,
    Undecided,
    Failure,
}

impl ValidationOutcome {
    pub fn combine(self, other: ValidationOutcome) -> ValidationOutcome {
        self.max(other)
    }
}

/// A diagnostic raised against a location in the instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    /// Instance location, e.g. `Patient.name[1].given`
    pub location: String,
    /// Path through the schema graph that produced the issue
    pub definition_path: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// A non-diagnostic note left by a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceNote {
    pub message: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Evidence {
    Issue(ValidationIssue),
    Trace(TraceNote),
    /// A whole report kept intact, used for externally resolved targets
    Report(ResultReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ResultReport {
    outcome: ValidationOutcome,
    evidence: Vec<Evidence>,
}

impl ResultReport {
    pub fn new(outcome: ValidationOutcome, evidence: Vec<Evidence>) -> Self {
        Self { outcome, evidence }
    }

    /// Plain success without evidence
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(evidence: Vec<Evidence>) -> Self {
        Self::new(ValidationOutcome::Failure, evidence)
    }

    pub fn undecided(evidence: Vec<Evidence>) -> Self {
        Self::new(ValidationOutcome::Undecided, evidence)
    }

    /// Report carrying a single issue; errors fail, everything else succeeds
    pub fn from_issue(issue: ValidationIssue) -> Self {
        let outcome = if issue.is_error() {
            ValidationOutcome::Failure
        } else {
            ValidationOutcome::Success
        };
        Self::new(outcome, vec![Evidence::Issue(issue)])
    }

    pub fn outcome(&self) -> ValidationOutcome {
        self.outcome
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    pub fn into_evidence(self) -> Vec<Evidence> {
        self.evidence
    }

    pub fn is_successful(&self) -> bool {
        self.outcome == ValidationOutcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ValidationOutcome::Failure
    }

    /// Success with nothing to say; dropped when combining
    pub fn is_plain_success(&self) -> bool {
        self.is_successful() && self.evidence.is_empty()
    }

    /// All issues, including those inside nested reports, in evidence order
    pub fn issues(&self) -> Vec<&ValidationIssue> {
        let mut issues = Vec::new();
        collect_issues(&self.evidence, &mut issues);
        issues
    }

    pub fn issues_with_code(&self, code: IssueCode) -> Vec<&ValidationIssue> {
        self.issues().into_iter().filter(|i| i.code == code).collect()
    }

    pub fn has_issue(&self, code: IssueCode) -> bool {
        !self.issues_with_code(code).is_empty()
    }

    /// Wrap this report as a single nested evidence item, keeping the outcome
    pub fn nest(self) -> ResultReport {
        if self.evidence.is_empty() {
            return self;
        }
        ResultReport::new(self.outcome, vec![Evidence::Report(self)])
    }

    /// Merge the reports of sibling rules.
    ///
    /// Plain successes carry no information and are dropped first. The
    /// outcome of the remainder is the weakest of all inputs, and their
    /// evidence is concatenated in input order without re-nesting.
    pub fn combine(reports: impl IntoIterator<Item = ResultReport>) -> ResultReport {
        let mut reports: Vec<ResultReport> = reports.into_iter().collect();
        if reports.len() <= 1 {
            return reports.pop().unwrap_or_default();
        }

        let mut informative: Vec<ResultReport> = reports
            .into_iter()
            .filter(|r| !r.is_plain_success())
            .collect();
        if informative.len() <= 1 {
            return informative.pop().unwrap_or_default();
        }

        informative
            .into_iter()
            .fold(ResultReport::success(), |mut acc, report| {
                acc.outcome = acc.outcome.combine(report.outcome);
                acc.evidence.extend(report.evidence);
                acc
            })
    }
}

fn collect_issues<'a>(evidence: &'a [Evidence], out: &mut Vec<&'a ValidationIssue>) {
    for item in evidence {
        match item {
            Evidence::Issue(issue) => out.push(issue),
            Evidence::Report(report) => collect_issues(&report.evidence, out),
            Evidence::Trace(_) => {}
        }
    }
}
