use crate::config::BestPracticeMode;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::expression::EvaluationContext;
use crate::instance::ElementNode;
use crate::issue::{IssueCode, Severity};
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::{IssueAssertion, TraceAssertion};
use std::sync::Arc;
use tracing::{trace, warn};

/// A constraint expressed in the external expression language
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantValidator {
    key: String,
    expression: String,
    human: String,
    severity: Severity,
    best_practice: bool,
}

impl InvariantValidator {
    pub fn new(key: impl Into<String>, expression: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expression: expression.into(),
            human: human.into(),
            severity: Severity::Error,
            best_practice: false,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Mark as a best-practice constraint, reported per [`BestPracticeMode`]
    pub fn best_practice(mut self) -> Self {
        self.best_practice = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_best_practice(&self) -> bool {
        self.best_practice
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let Some(evaluator) = context.expression_evaluator() else {
            trace!(key = %self.key, "no expression evaluator, skipping invariant");
            return Ok(TraceAssertion::when_enabled(
                context,
                state,
                format!("Invariant {} not evaluated: no expression evaluator", self.key),
            ));
        };

        let eval_ctx = EvaluationContext::from_state(input, state);
        let report = match evaluator.evaluate(&self.expression, input, &eval_ctx).await {
            Ok(true) => ResultReport::success(),
            Ok(false) => self
                .violation(context.config.best_practices)
                .as_result(state),
            Err(err) => {
                warn!(key = %self.key, error = %err, "invariant evaluation failed");
                IssueAssertion::new(
                    IssueCode::InvariantEvaluationFailed,
                    format!("Evaluation of constraint '{}' failed: {err}", self.key),
                )
                .as_result(state)
            }
        };
        Ok(report)
    }

    fn violation(&self, mode: BestPracticeMode) -> IssueAssertion {
        let message = format!("Instance failed constraint {} \"{}\"", self.key, self.human);
        let code = if self.best_practice {
            IssueCode::BestPracticeViolation
        } else {
            IssueCode::InvariantFailed
        };
        let severity = match (self.best_practice, mode) {
            (true, BestPracticeMode::Enabled) => Severity::Error,
            (true, _) => Severity::Warning,
            (false, _) => self.severity,
        };
        IssueAssertion::new(code, message).with_severity(severity)
    }
}
