use crate::error::{Result, ValidationError};
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use std::sync::Arc;

/// Occurrence bounds for a group of sibling elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityValidator {
    min: Option<i64>,
    max: Option<i64>,
}

impl CardinalityValidator {
    /// Bounds are inclusive; `None` leaves a side open
    pub fn new(min: Option<i64>, max: Option<i64>) -> Result<Self> {
        if min.is_some_and(|m| m < 0) {
            return Err(ValidationError::invalid_configuration(
                "cardinality",
                "min must be non-negative",
            ));
        }
        if max.is_some_and(|m| m < 0) {
            return Err(ValidationError::invalid_configuration(
                "cardinality",
                "max must be non-negative",
            ));
        }
        if let (Some(min), Some(max)) = (min, max)
            && min > max
        {
            return Err(ValidationError::invalid_configuration(
                "cardinality",
                format!("min ({min}) exceeds max ({max})"),
            ));
        }
        Ok(Self { min, max })
    }

    /// Parse FHIR-style bounds, where max is a number or `*`
    pub fn from_fhir(min: Option<i64>, max: Option<&str>) -> Result<Self> {
        let max = match max {
            None | Some("*") => None,
            Some(m) => Some(m.parse::<i64>().map_err(|_| {
                ValidationError::invalid_configuration("cardinality", format!("invalid max '{m}'"))
            })?),
        };
        Self::new(min, max)
    }

    pub fn min(&self) -> Option<i64> {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn validate_many(&self, input: &[Arc<ElementNode>], state: &ValidationState) -> ResultReport {
        let count = input.len() as i64;
        let too_few = self.min.is_some_and(|min| count < min);
        let too_many = self.max.is_some_and(|max| count > max);
        if !too_few && !too_many {
            return ResultReport::success();
        }

        IssueAssertion::new(
            IssueCode::CardinalityViolation,
            format!(
                "Instance count is {count}, which is not within the specified cardinality of {}",
                self.render()
            ),
        )
        .as_result(state)
    }

    /// Bounds as `min..max`, with `*` for an open max
    pub fn render(&self) -> String {
        let max = self
            .max
            .map(|m| m.to_string())
            .unwrap_or_else(|| "*".to_string());
        format!("{}..{max}", self.min.unwrap_or(0))
    }
}
