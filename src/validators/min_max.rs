use crate::error::{Result, ValidationError};
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMaxKind {
    MinValue,
    MaxValue,
}

impl MinMaxKind {
    pub fn name(&self) -> &'static str {
        match self {
            MinMaxKind::MinValue => "minValue",
            MinMaxKind::MaxValue => "maxValue",
        }
    }
}

/// Lower or upper bound on a number, date, dateTime, time or Quantity value
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxValueValidator {
    limit: JsonValue,
    kind: MinMaxKind,
}

impl MinMaxValueValidator {
    /// The limit must be a number or a date/time string
    pub fn new(limit: JsonValue, kind: MinMaxKind) -> Result<Self> {
        let valid = match &limit {
            JsonValue::Number(_) => true,
            JsonValue::String(s) => Comparable::parse_temporal(s).is_some(),
            _ => false,
        };
        if !valid {
            return Err(ValidationError::invalid_configuration(
                kind.name(),
                format!("limit {limit} is neither a number nor a date/time"),
            ));
        }
        Ok(Self { limit, kind })
    }

    pub fn min(limit: JsonValue) -> Result<Self> {
        Self::new(limit, MinMaxKind::MinValue)
    }

    pub fn max(limit: JsonValue) -> Result<Self> {
        Self::new(limit, MinMaxKind::MaxValue)
    }

    pub fn kind(&self) -> MinMaxKind {
        self.kind
    }

    pub fn limit(&self) -> &JsonValue {
        &self.limit
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        // Quantities are compared on their numeric value
        let value = input
            .value()
            .or_else(|| input.child("value").and_then(|v| v.value()));
        let Some(value) = value else {
            return ResultReport::success();
        };

        let ordering = match (Comparable::from_json(value), Comparable::from_json(&self.limit)) {
            (Some(actual), Some(limit)) => actual.compare(&limit),
            _ => None,
        };
        let Some(ordering) = ordering else {
            return IssueAssertion::new(
                IssueCode::IncomparableValue,
                format!("Value {value} cannot be compared with {} {}", self.kind.name(), self.limit),
            )
            .as_result(state);
        };

        match (self.kind, ordering) {
            (MinMaxKind::MinValue, Ordering::Less) => IssueAssertion::new(
                IssueCode::ValueTooSmall,
                format!("Value {value} is smaller than the minimum value {}", self.limit),
            )
            .as_result(state),
            (MinMaxKind::MaxValue, Ordering::Greater) => IssueAssertion::new(
                IssueCode::ValueTooLarge,
                format!("Value {value} is larger than the maximum value {}", self.limit),
            )
            .as_result(state),
            _ => ResultReport::success(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Comparable {
    Number(f64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    /// Partial dates (`2020`, `2020-04`) compare textually at equal precision
    PartialDate(String),
}

impl Comparable {
    fn from_json(value: &JsonValue) -> Option<Comparable> {
        match value {
            JsonValue::Number(n) => n.as_f64().map(Comparable::Number),
            JsonValue::String(s) => Self::parse_temporal(s),
            _ => None,
        }
    }

    fn parse_temporal(s: &str) -> Option<Comparable> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Comparable::DateTime(dt));
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Comparable::Date(date));
        }
        if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
            return Some(Comparable::Time(time));
        }
        let partial = s.len() == 4 || (s.len() == 7 && s.as_bytes()[4] == b'-');
        let digits = s.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit());
        (partial && digits).then(|| Comparable::PartialDate(s.to_string()))
    }

    fn compare(&self, other: &Comparable) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::Date(a), Comparable::Date(b)) => Some(a.cmp(b)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => Some(a.cmp(b)),
            (Comparable::Date(a), Comparable::DateTime(b)) => Some(a.cmp(&b.date_naive())),
            (Comparable::DateTime(a), Comparable::Date(b)) => Some(a.date_naive().cmp(b)),
            (Comparable::Time(a), Comparable::Time(b)) => Some(a.cmp(b)),
            (Comparable::PartialDate(a), Comparable::PartialDate(b)) if a.len() == b.len() => {
                Some(a.cmp(b))
            }
            _ => None,
        }
    }
}

/// Maximum length of a string value, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLengthValidator {
    max: usize,
}

impl MaxLengthValidator {
    pub fn new(max: usize) -> Result<Self> {
        if max == 0 {
            return Err(ValidationError::invalid_configuration(
                "maxLength",
                "maximum length must be positive",
            ));
        }
        Ok(Self { max })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        let Some(text) = input.value_str() else {
            return ResultReport::success();
        };
        let length = text.chars().count();
        if length <= self.max {
            return ResultReport::success();
        }
        IssueAssertion::new(
            IssueCode::ValueTooLong,
            format!(
                "Value is {length} characters long, which exceeds the maximum length of {}",
                self.max
            ),
        )
        .as_result(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(type_name: &str, v: JsonValue) -> Arc<ElementNode> {
        Arc::new(ElementNode::primitive("value", type_name, v))
    }

    #[test]
    fn test_numeric_bounds() {
        let state = ValidationState::new("Observation");
        let min = MinMaxValueValidator::min(json!(1)).unwrap();
        let max = MinMaxValueValidator::max(json!(10.5)).unwrap();

        assert!(min.validate_one(&value("integer", json!(1)), &state).is_successful());
        assert!(min.validate_one(&value("integer", json!(0)), &state).has_issue(IssueCode::ValueTooSmall));
        assert!(max.validate_one(&value("decimal", json!(10.6)), &state).has_issue(IssueCode::ValueTooLarge));
    }

    #[test]
    fn test_date_bounds() {
        let state = ValidationState::new("Patient");
        let max = MinMaxValueValidator::max(json!("2020-01-01")).unwrap();

        assert!(max.validate_one(&value("date", json!("2019-12-31")), &state).is_successful());
        assert!(max.validate_one(&value("date", json!("2020-01-02")), &state).is_failure());
        assert!(
            max.validate_one(&value("dateTime", json!("2020-06-01T10:00:00Z")), &state)
                .is_failure()
        );
    }

    #[test]
    fn test_quantity_value() {
        let state = ValidationState::new("Observation");
        let min = MinMaxValueValidator::min(json!(0)).unwrap();
        let quantity = Arc::new(
            ElementNode::new("valueQuantity")
                .with_type("Quantity")
                .with_child(ElementNode::primitive("value", "decimal", -2.5)),
        );
        assert!(min.validate_one(&quantity, &state).has_issue(IssueCode::ValueTooSmall));
    }

    #[test]
    fn test_incomparable() {
        let state = ValidationState::new("Patient");
        let min = MinMaxValueValidator::min(json!(3)).unwrap();
        let report = min.validate_one(&value("string", json!("abc")), &state);
        assert!(report.has_issue(IssueCode::IncomparableValue));
    }

    #[test]
    fn test_invalid_limits() {
        assert!(MinMaxValueValidator::min(json!({"value": 1})).is_err());
        assert!(MinMaxValueValidator::max(json!("not a date")).is_err());
        assert!(MaxLengthValidator::new(0).is_err());
    }

    #[test]
    fn test_max_length_counts_characters() {
        let state = ValidationState::new("Patient");
        let rule = MaxLengthValidator::new(3).unwrap();
        assert!(rule.validate_one(&value("string", json!("äöü")), &state).is_successful());
        assert!(rule.validate_one(&value("string", json!("abcd")), &state).has_issue(IssueCode::ValueTooLong));
    }
}
