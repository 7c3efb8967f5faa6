//! Validation context: options, collaborators and filters for a run.
//!
//! The context is immutable during a run and shared by reference. Every
//! collaborator is optional; rules that need a missing one either skip (terminology,
//! expressions) or fail the call (schema resolution).

use crate::assertion::Assertion;
use crate::canonical::Canonical;
use crate::config::{BestPracticeMode, ValidationConfig};
use crate::error::{Result, ValidationError};
use crate::expression::ExpressionEvaluator;
use crate::reference::ExternalReferenceResolver;
use crate::resolver::SchemaResolver;
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::terminology::TerminologyService;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Picks which declared `meta.profile` canonicals are validated
pub trait MetaProfileSelector: Send + Sync {
    fn select(&self, location: &str, declared: &[Canonical]) -> Vec<Canonical>;
}

impl<F> MetaProfileSelector for F
where
    F: Fn(&str, &[Canonical]) -> Vec<Canonical> + Send + Sync,
{
    fn select(&self, location: &str, declared: &[Canonical]) -> Vec<Canonical> {
        self(location, declared)
    }
}

/// Maps a runtime type label to the canonical of its schema
pub trait TypeNameMapper: Send + Sync {
    fn map(&self, type_name: &str) -> Option<Canonical>;
}

impl<F> TypeNameMapper for F
where
    F: Fn(&str) -> Option<Canonical> + Send + Sync,
{
    fn map(&self, type_name: &str) -> Option<Canonical> {
        self(type_name)
    }
}

pub type AssertionFilter = Arc<dyn Fn(&Assertion) -> bool + Send + Sync>;

/// Cooperative cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct ValidationContext {
    pub config: ValidationConfig,
    schema_resolver: Option<Arc<dyn SchemaResolver>>,
    reference_resolver: Option<Arc<dyn ExternalReferenceResolver>>,
    terminology: Option<Arc<dyn TerminologyService>>,
    expression_evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    profile_selector: Option<Arc<dyn MetaProfileSelector>>,
    type_mapper: Option<Arc<dyn TypeNameMapper>>,
    include: Option<AssertionFilter>,
    exclude: Option<AssertionFilter>,
    cancellation: Option<CancellationToken>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_schema_resolver(mut self, resolver: Arc<dyn SchemaResolver>) -> Self {
        self.schema_resolver = Some(resolver);
        self
    }

    pub fn with_reference_resolver(mut self, resolver: Arc<dyn ExternalReferenceResolver>) -> Self {
        self.reference_resolver = Some(resolver);
        self
    }

    pub fn with_terminology_service(mut self, service: Arc<dyn TerminologyService>) -> Self {
        self.terminology = Some(service);
        self
    }

    pub fn with_expression_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expression_evaluator = Some(evaluator);
        self
    }

    pub fn with_profile_selector(mut self, selector: Arc<dyn MetaProfileSelector>) -> Self {
        self.profile_selector = Some(selector);
        self
    }

    pub fn with_type_mapper(mut self, mapper: Arc<dyn TypeNameMapper>) -> Self {
        self.type_mapper = Some(mapper);
        self
    }

    /// Only evaluate assertions the filter accepts
    pub fn with_include_filter(mut self, filter: AssertionFilter) -> Self {
        self.include = Some(filter);
        self
    }

    /// Skip assertions the filter accepts
    pub fn with_exclude_filter(mut self, filter: AssertionFilter) -> Self {
        self.exclude = Some(filter);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn reference_resolver(&self) -> Option<&Arc<dyn ExternalReferenceResolver>> {
        self.reference_resolver.as_ref()
    }

    pub fn terminology(&self) -> Option<&Arc<dyn TerminologyService>> {
        self.terminology.as_ref()
    }

    pub fn expression_evaluator(&self) -> Option<&Arc<dyn ExpressionEvaluator>> {
        self.expression_evaluator.as_ref()
    }

    /// Whether a schema member takes part in this run
    pub fn accepts(&self, assertion: &Assertion) -> bool {
        if self.config.best_practices == BestPracticeMode::Disabled
            && let Assertion::Invariant(invariant) = assertion
            && invariant.is_best_practice()
        {
            return false;
        }
        let included = self.include.as_ref().is_none_or(|f| f(assertion));
        let excluded = self.exclude.as_ref().is_some_and(|f| f(assertion));
        included && !excluded
    }

    pub fn check_cancelled(&self, state: &ValidationState) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(ValidationError::cancelled(
                state.instance_location().to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Resolve a schema; an unknown canonical is `Ok(None)`
    pub async fn resolve_schema(&self, canonical: &Canonical) -> Result<Option<Arc<ElementSchema>>> {
        let resolver = self
            .schema_resolver
            .as_ref()
            .ok_or_else(|| ValidationError::no_schema_resolver(canonical.as_str()))?;
        Ok(resolver.resolve(canonical).await)
    }

    pub fn select_profiles(&self, location: &str, declared: Vec<Canonical>) -> Vec<Canonical> {
        match &self.profile_selector {
            Some(selector) => selector.select(location, &declared),
            None => declared,
        }
    }

    pub fn canonical_for_type(&self, type_name: &str) -> Canonical {
        self.type_mapper
            .as_ref()
            .and_then(|m| m.map(type_name))
            .unwrap_or_else(|| Canonical::for_fhir_type(type_name))
    }
}

impl fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationContext")
            .field("config", &self.config)
            .field("schema_resolver", &self.schema_resolver.is_some())
            .field("reference_resolver", &self.reference_resolver.is_some())
            .field("terminology", &self.terminology.is_some())
            .field("expression_evaluator", &self.expression_evaluator.is_some())
            .field("profile_selector", &self.profile_selector.is_some())
            .field("type_mapper", &self.type_mapper.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}
