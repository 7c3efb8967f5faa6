use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The node must equal the fixed value exactly
#[derive(Debug, Clone, PartialEq)]
pub struct FixedValidator {
    value: JsonValue,
}

impl FixedValidator {
    pub fn new(value: JsonValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &JsonValue {
        &self.value
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        let actual = input.to_json();
        if json_equivalent(&actual, &self.value) {
            return ResultReport::success();
        }
        IssueAssertion::new(
            IssueCode::FixedValueMismatch,
            format!(
                "Value '{}' is not exactly equal to fixed value '{}'",
                display_json(&actual),
                display_json(&self.value)
            ),
        )
        .as_result(state)
    }
}

/// The node must contain at least everything in the pattern
#[derive(Debug, Clone, PartialEq)]
pub struct PatternValidator {
    pattern: JsonValue,
}

impl PatternValidator {
    pub fn new(pattern: JsonValue) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &JsonValue {
        &self.pattern
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        let actual = input.to_json();
        if deep_partial_match(&actual, &self.pattern) {
            return ResultReport::success();
        }
        IssueAssertion::new(
            IssueCode::PatternMismatch,
            format!(
                "Value '{}' does not match pattern '{}'",
                display_json(&actual),
                display_json(&self.pattern)
            ),
        )
        .as_result(state)
    }
}

/// Deep partial match for pattern comparison.
///
/// - a null or empty pattern matches anything
/// - object patterns need every key present in the item with a matching value
/// - array patterns need a matching item element for every pattern element;
///   a non-array item counts as a one-element array
/// - scalars compare by value, numbers numerically
pub fn deep_partial_match(item: &JsonValue, pattern: &JsonValue) -> bool {
    match pattern {
        JsonValue::Null => true,
        JsonValue::Object(pattern_map) => {
            if pattern_map.is_empty() {
                return true;
            }
            let Some(item_map) = item.as_object() else {
                return false;
            };
            pattern_map.iter().all(|(key, pattern_value)| {
                item_map
                    .get(key)
                    .is_some_and(|item_value| deep_partial_match(item_value, pattern_value))
            })
        }
        JsonValue::Array(pattern_array) => {
            let items = std::slice::from_ref(item);
            let item_array = item.as_array().map(Vec::as_slice).unwrap_or(items);
            pattern_array.iter().all(|pattern_element| {
                item_array
                    .iter()
                    .any(|item_element| deep_partial_match(item_element, pattern_element))
            })
        }
        JsonValue::String(_) | JsonValue::Bool(_) | JsonValue::Number(_) => {
            scalar_equal(item, pattern)
        }
    }
}

/// Exact equality, treating a one-element array and its element as equal
fn json_equivalent(actual: &JsonValue, expected: &JsonValue) -> bool {
    match (actual, expected) {
        (JsonValue::Object(a), JsonValue::Object(e)) => {
            a.len() == e.len()
                && e.iter()
                    .all(|(k, ev)| a.get(k).is_some_and(|av| json_equivalent(av, ev)))
        }
        (JsonValue::Array(a), JsonValue::Array(e)) => {
            a.len() == e.len() && a.iter().zip(e).all(|(av, ev)| json_equivalent(av, ev))
        }
        (JsonValue::Array(a), other) if a.len() == 1 => json_equivalent(&a[0], other),
        (other, JsonValue::Array(e)) if e.len() == 1 => json_equivalent(other, &e[0]),
        _ => scalar_equal(actual, expected),
    }
}

fn scalar_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn display_json(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
