//! Error types for the validation engine.
//!
//! Errors here are *not* validation outcomes. Bad instance data always ends up
//! as evidence inside a [`ResultReport`](crate::report::ResultReport); a
//! [`ValidationError`] means the engine itself was misused: a rule was built
//! with impossible parameters, a collaborator the schema graph needs was never
//! supplied, or the caller cancelled the run.

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Errors that abort a validation run or reject rule construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A rule was constructed with parameters that can never be satisfied
    #[error("Invalid configuration for {rule}: {message}")]
    InvalidConfiguration { rule: String, message: String },

    /// A schema had to be dereferenced but no schema resolver was configured
    #[error("No schema resolver configured, cannot resolve {canonical}")]
    NoSchemaResolver { canonical: String },

    /// A rule that only evaluates single nodes was handed a larger group
    #[error("Rule {rule} can only validate a single node, but was given {count} nodes at {location}")]
    GroupShapeMismatch {
        rule: String,
        count: usize,
        location: String,
    },

    /// The caller cancelled the validation run
    #[error("Validation cancelled at {location}")]
    Cancelled { location: String },
}

impl ValidationError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Create a missing schema resolver error
    pub fn no_schema_resolver(canonical: impl Into<String>) -> Self {
        Self::NoSchemaResolver {
            canonical: canonical.into(),
        }
    }

    /// Create a group shape mismatch error
    pub fn group_shape_mismatch(
        rule: impl Into<String>,
        count: usize,
        location: impl Into<String>,
    ) -> Self {
        Self::GroupShapeMismatch {
            rule: rule.into(),
            count,
            location: location.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(location: impl Into<String>) -> Self {
        Self::Cancelled {
            location: location.into(),
        }
    }
}

impl From<regex::Error> for ValidationError {
    fn from(err: regex::Error) -> Self {
        Self::invalid_configuration("regex", err.to_string())
    }
}
