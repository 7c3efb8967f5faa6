//! Issue catalog for validation evidence.
//!
//! Every issue the engine can raise has a stable code. The numbering follows
//! the `FV1xxx` scheme; the default severity decides whether an issue turns a
//! report into a failure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational messages
    Information,
    /// Warning messages
    Warning,
    /// Error messages (validation failures)
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Information => write!(f, "information"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Error codes for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    UnknownChild,
    WrongType,
    SlicingUnmatched,
    InvariantFailed,
    CardinalityViolation,
    BindingViolation,
    FixedValueMismatch,
    PatternMismatch,
    RegexMismatch,
    ValueTooSmall,
    ValueTooLarge,
    ValueTooLong,
    IncomparableValue,
    SliceOutOfOrder,
    SlicingRuleViolated,
    NoChoiceMatched,
    IncompatibleDeclaredType,
    IncompatibleProfiles,
    UnresolvableSchema,
    MissingExtensionUrl,
    AbstractType,
    InvariantEvaluationFailed,
    BestPracticeViolation,
    ExtensibleBindingViolation,
    TerminologyUnavailable,
    UnparseableReference,
    ReferenceNotResolvable,
    ExternalReferenceUnavailable,
    InvalidAggregation,
    InvalidVersioning,
    ReferenceCycleDetected,
    /// Codes supplied by the schema compiler
    Custom(u32),
}

impl IssueCode {
    pub fn number(&self) -> u32 {
        match self {
            IssueCode::UnknownChild => 1001,
            IssueCode::WrongType => 1006,
            IssueCode::SlicingUnmatched => 1007,
            IssueCode::InvariantFailed => 1010,
            IssueCode::CardinalityViolation => 1011,
            IssueCode::BindingViolation => 1012,
            IssueCode::FixedValueMismatch => 1020,
            IssueCode::PatternMismatch => 1021,
            IssueCode::RegexMismatch => 1022,
            IssueCode::ValueTooSmall => 1023,
            IssueCode::ValueTooLarge => 1024,
            IssueCode::ValueTooLong => 1025,
            IssueCode::IncomparableValue => 1026,
            IssueCode::SliceOutOfOrder => 1030,
            IssueCode::SlicingRuleViolated => 1031,
            IssueCode::NoChoiceMatched => 1040,
            IssueCode::IncompatibleDeclaredType => 1050,
            IssueCode::IncompatibleProfiles => 1051,
            IssueCode::UnresolvableSchema => 1052,
            IssueCode::MissingExtensionUrl => 1053,
            IssueCode::AbstractType => 1054,
            IssueCode::InvariantEvaluationFailed => 1060,
            IssueCode::BestPracticeViolation => 1061,
            IssueCode::ExtensibleBindingViolation => 1070,
            IssueCode::TerminologyUnavailable => 1071,
            IssueCode::UnparseableReference => 1080,
            IssueCode::ReferenceNotResolvable => 1081,
            IssueCode::ExternalReferenceUnavailable => 1082,
            IssueCode::InvalidAggregation => 1083,
            IssueCode::InvalidVersioning => 1084,
            IssueCode::ReferenceCycleDetected => 1086,
            IssueCode::Custom(n) => *n,
        }
    }

    /// Severity an issue with this code gets unless a rule overrides it
    pub fn default_severity(&self) -> Severity {
        match self {
            IssueCode::UnresolvableSchema
            | IssueCode::BestPracticeViolation
            | IssueCode::ExtensibleBindingViolation
            | IssueCode::TerminologyUnavailable
            | IssueCode::ExternalReferenceUnavailable
            | IssueCode::ReferenceCycleDetected => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FV{:04}", self.number())
    }
}
