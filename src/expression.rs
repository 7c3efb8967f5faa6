//! Expression evaluation seam for invariant rules.
//!
//! The engine does not implement FHIRPath. Invariants hand their expression
//! to an [`ExpressionEvaluator`] together with an [`EvaluationContext`]
//! carrying the standard FHIR variables (`%context`, `%resource`,
//! `%rootResource`, `%ucum`).

use crate::instance::ElementNode;
use crate::state::ValidationState;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const UCUM_URL: &str = "http://unitsofmeasure.org";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Failed to evaluate expression '{expression}': {message}")]
    Evaluation { expression: String, message: String },

    /// The expression produced something other than a single boolean
    #[error("Expression '{expression}' did not produce a boolean")]
    NotBoolean { expression: String },
}

/// Evaluates invariant expressions against instance nodes
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` with `node` as focus; `Ok(true)` means the invariant holds
    async fn evaluate(
        &self,
        expression: &str,
        node: &Arc<ElementNode>,
        context: &EvaluationContext,
    ) -> Result<bool, ExpressionError>;
}

/// Variables available to an invariant expression
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    context: Arc<ElementNode>,
    resource: Option<Arc<ElementNode>>,
    root_resource: Option<Arc<ElementNode>>,
    location: String,
    variables: HashMap<String, JsonValue>,
    ucum_url: String,
}

impl EvaluationContext {
    pub fn new(context: Arc<ElementNode>, location: impl Into<String>) -> Self {
        Self {
            context,
            resource: None,
            root_resource: None,
            location: location.into(),
            variables: HashMap::new(),
            ucum_url: UCUM_URL.to_string(),
        }
    }

    /// Context for `node`, taking the enclosing resources from the state
    pub fn from_state(node: &Arc<ElementNode>, state: &ValidationState) -> Self {
        let mut ctx = Self::new(Arc::clone(node), state.instance_location().to_string());
        ctx.resource = state.current_resource().map(|f| Arc::clone(&f.node));
        ctx.root_resource = state.root_resource().map(|f| Arc::clone(&f.node));
        ctx
    }

    /// `%context`
    pub fn context(&self) -> &Arc<ElementNode> {
        &self.context
    }

    /// `%resource`; the focus itself when no resource encloses it
    pub fn resource(&self) -> &Arc<ElementNode> {
        self.resource.as_ref().unwrap_or(&self.context)
    }

    /// `%rootResource`
    pub fn root_resource(&self) -> &Arc<ElementNode> {
        self.root_resource.as_ref().unwrap_or_else(|| self.resource())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn ucum_url(&self) -> &str {
        &self.ucum_url
    }

    pub fn set_ucum_url(&mut self, url: String) {
        self.ucum_url = url;
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: JsonValue) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<&JsonValue> {
        self.variables.get(name)
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.resource().instance_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_state_uses_enclosing_resources() {
        let bundle = Arc::new(ElementNode::resource("Bundle"));
        let patient = Arc::new(ElementNode::resource("Patient"));
        let state = ValidationState::new("Bundle")
            .with_resource(Arc::clone(&bundle))
            .with_child("entry")
            .with_child("resource")
            .with_resource(Arc::clone(&patient))
            .with_child("name");
        let name = Arc::new(ElementNode::new("name"));

        let ctx = EvaluationContext::from_state(&name, &state);
        assert_eq!(ctx.resource_type(), Some("Patient"));
        assert_eq!(ctx.root_resource().instance_type(), Some("Bundle"));
        assert_eq!(ctx.location(), "Bundle.entry.resource.name");
        assert_eq!(ctx.ucum_url(), UCUM_URL);
    }

    #[test]
    fn test_resource_defaults_to_focus() {
        let node = Arc::new(ElementNode::resource("Patient"));
        let ctx = EvaluationContext::new(Arc::clone(&node), "Patient");
        assert_eq!(ctx.resource().instance_type(), Some("Patient"));
        assert_eq!(ctx.root_resource().instance_type(), Some("Patient"));
    }
}
