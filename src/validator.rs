//! Entry points for validating instances.

use crate::assertion::Input;
use crate::canonical::Canonical;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::report::ResultReport;
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::validators::SchemaReferenceValidator;
use std::sync::Arc;
use tracing::debug;

/// Validates instances against schemas using one set of collaborators.
///
/// Every call starts a fresh run: location tracking and the re-entrancy
/// registry never leak between calls, so one `Validator` can serve
/// concurrent validations.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    context: ValidationContext,
}

impl Validator {
    pub fn new(context: ValidationContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Validate a single instance; locations are rooted at the instance name
    pub async fn validate_one(
        &self,
        schema: &ElementSchema,
        instance: &Arc<ElementNode>,
    ) -> Result<ResultReport> {
        let state = ValidationState::new(instance.name());
        debug!(schema = %schema.id(), root = instance.name(), "validating instance");
        let report = schema.validate_one(instance, &self.context, &state).await;
        finish(&state, report)
    }

    /// Validate a group of sibling instances against one schema
    pub async fn validate_many(
        &self,
        schema: &ElementSchema,
        instances: &[Arc<ElementNode>],
    ) -> Result<ResultReport> {
        let root = instances.first().map(|i| i.name()).unwrap_or_default();
        let state = ValidationState::new(root);
        debug!(schema = %schema.id(), count = instances.len(), "validating instances");
        let report = schema.validate_many(instances, &self.context, &state).await;
        finish(&state, report)
    }

    /// Validate against a schema looked up through the schema resolver
    pub async fn validate_canonical(
        &self,
        canonical: impl Into<Canonical>,
        instance: &Arc<ElementNode>,
    ) -> Result<ResultReport> {
        let state = ValidationState::new(instance.name());
        let reference = SchemaReferenceValidator::new(canonical);
        debug!(schema = %reference.canonical(), root = instance.name(), "validating instance");
        let report = reference
            .validate(Input::One(instance), &self.context, &state)
            .await;
        finish(&state, report)
    }

    /// Blocking variant of [`validate_one`](Self::validate_one) for callers
    /// without an async runtime
    pub fn validate_one_blocking(
        &self,
        schema: &ElementSchema,
        instance: &Arc<ElementNode>,
    ) -> Result<ResultReport> {
        futures::executor::block_on(self.validate_one(schema, instance))
    }
}

fn finish(state: &ValidationState, report: Result<ResultReport>) -> Result<ResultReport> {
    match &report {
        Ok(report) => debug!(
            outcome = ?report.outcome(),
            resources = state.run().resources_validated(),
            "validation finished"
        ),
        Err(err) => debug!(error = %err, "validation aborted"),
    }
    report
}
