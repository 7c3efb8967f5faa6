//! Run-time options for a validation run.

use crate::issue::Severity;
use serde::{Deserialize, Serialize};

/// How best-practice constraints are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BestPracticeMode {
    /// Violations are errors
    Enabled,
    /// Violations are reported as warnings
    #[default]
    Ignore,
    /// Best-practice constraints are not evaluated
    Disabled,
}

/// What a failing collaborator (terminology server, reference store) turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceFailurePolicy {
    #[default]
    Warning,
    Error,
}

impl ServiceFailurePolicy {
    pub fn severity(self) -> Severity {
        match self {
            ServiceFailurePolicy::Warning => Severity::Warning,
            ServiceFailurePolicy::Error => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    pub best_practices: BestPracticeMode,
    pub terminology_failure: ServiceFailurePolicy,
    pub reference_failure: ServiceFailurePolicy,
    /// Leave trace evidence for rules that were skipped
    pub trace: bool,
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_best_practices(mut self, mode: BestPracticeMode) -> Self {
        self.best_practices = mode;
        self
    }

    pub fn with_terminology_failure(mut self, policy: ServiceFailurePolicy) -> Self {
        self.terminology_failure = policy;
        self
    }

    pub fn with_reference_failure(mut self, policy: ServiceFailurePolicy) -> Self {
        self.reference_failure = policy;
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
