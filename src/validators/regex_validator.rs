use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The primitive value, rendered as text, must fully match the pattern
#[derive(Debug, Clone)]
pub struct RegexValidator {
    pattern: String,
    regex: Regex,
}

impl RegexValidator {
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self { pattern, regex })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn validate_one(&self, input: &Arc<ElementNode>, state: &ValidationState) -> ResultReport {
        let text = match input.value() {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(JsonValue::Bool(b)) => b.to_string(),
            _ => return ResultReport::success(),
        };
        if self.regex.is_match(&text) {
            return ResultReport::success();
        }
        IssueAssertion::new(
            IssueCode::RegexMismatch,
            format!("Value '{text}' does not match regex '{}'", self.pattern),
        )
        .as_result(state)
    }
}

impl PartialEq for RegexValidator {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}
