//! Reference resolution for references between resources.
//!
//! A reference found in an instance is classified by where its target
//! lives: inside the enclosing resource (`contained`), inside the enclosing
//! Bundle (`bundled`), or somewhere else (`referenced`). Targets inside the
//! instance are validated in the same location scope, behind an internal
//! reference marker. External targets come from an optional
//! [`ExternalReferenceResolver`] and are validated in a scope of their own.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_validator::reference::{FnReferenceResolver, ReferencedInstanceValidator};
//!
//! let resolver = FnReferenceResolver::new(|reference, _source| Ok(store.get(reference).cloned()));
//! let context = ValidationContext::new().with_reference_resolver(Arc::new(resolver));
//! ```

use crate::assertion::Assertion;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::{Obligation, ResourceFrame, ValidationState};
use crate::validators::{IssueAssertion, TraceAssertion};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Error codes for reference resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceErrorCode {
    /// REF1001: Referenced resource does not exist
    NonExistentResource = 1001,
    /// REF1002: Reference service unavailable
    ServiceUnavailable = 1002,
    /// REF1003: Invalid reference format
    InvalidReferenceFormat = 1003,
}

impl fmt::Display for ReferenceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REF{:04}", *self as u32)
    }
}

/// Errors an external reference resolver can report
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Referenced resource {reference} does not exist")]
    NonExistentResource { reference: String },

    #[error("Reference resolution service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Invalid reference format: {reference}")]
    InvalidReferenceFormat { reference: String },
}

impl ReferenceError {
    pub fn code(&self) -> ReferenceErrorCode {
        match self {
            ReferenceError::NonExistentResource { .. } => ReferenceErrorCode::NonExistentResource,
            ReferenceError::ServiceUnavailable { .. } => ReferenceErrorCode::ServiceUnavailable,
            ReferenceError::InvalidReferenceFormat { .. } => {
                ReferenceErrorCode::InvalidReferenceFormat
            }
        }
    }
}

pub type ReferenceResult<T> = std::result::Result<T, ReferenceError>;

/// Fetches resources that live outside the validated instance.
///
/// `Ok(None)` means the resource is unknown to the resolver. Errors are
/// reported according to the configured reference failure policy and never
/// abort the validation.
#[async_trait]
pub trait ExternalReferenceResolver: Send + Sync {
    async fn resolve(
        &self,
        reference: &str,
        source_location: &str,
    ) -> ReferenceResult<Option<Arc<ElementNode>>>;
}

/// Adapter turning a synchronous closure into a resolver
pub struct FnReferenceResolver<F> {
    resolve: F,
}

impl<F> FnReferenceResolver<F>
where
    F: Fn(&str, &str) -> ReferenceResult<Option<Arc<ElementNode>>> + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

#[async_trait]
impl<F> ExternalReferenceResolver for FnReferenceResolver<F>
where
    F: Fn(&str, &str) -> ReferenceResult<Option<Arc<ElementNode>>> + Send + Sync,
{
    async fn resolve(
        &self,
        reference: &str,
        source_location: &str,
    ) -> ReferenceResult<Option<Arc<ElementNode>>> {
        (self.resolve)(reference, source_location)
    }
}

/// Resolver over a fixed set of resources, keyed by reference string
#[derive(Debug, Default, Clone)]
pub struct InMemoryReferenceResolver {
    resources: HashMap<String, Arc<ElementNode>>,
}

impl InMemoryReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reference: impl Into<String>, resource: Arc<ElementNode>) {
        self.resources.insert(reference.into(), resource);
    }

    pub fn with_resource(mut self, reference: impl Into<String>, resource: Arc<ElementNode>) -> Self {
        self.add(reference, resource);
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ExternalReferenceResolver for InMemoryReferenceResolver {
    async fn resolve(
        &self,
        reference: &str,
        _source_location: &str,
    ) -> ReferenceResult<Option<Arc<ElementNode>>> {
        Ok(self.resources.get(reference).cloned())
    }
}

/// Where a reference target was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMode {
    Contained,
    Bundled,
    Referenced,
}

impl AggregationMode {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "contained" => Some(AggregationMode::Contained),
            "bundled" => Some(AggregationMode::Bundled),
            "referenced" => Some(AggregationMode::Referenced),
            _ => None,
        }
    }
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::Contained => write!(f, "contained"),
            AggregationMode::Bundled => write!(f, "bundled"),
            AggregationMode::Referenced => write!(f, "referenced"),
        }
    }
}

/// Whether a reference pins a specific version of its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReferenceVersioning {
    #[default]
    Either,
    Independent,
    Specific,
}

impl ReferenceVersioning {
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "either" => Some(ReferenceVersioning::Either),
            "independent" => Some(ReferenceVersioning::Independent),
            "specific" => Some(ReferenceVersioning::Specific),
            _ => None,
        }
    }

    /// Does a reference with versioning `actual` satisfy this rule
    pub fn accepts(self, actual: ReferenceVersioning) -> bool {
        self == ReferenceVersioning::Either || self == actual
    }
}

impl fmt::Display for ReferenceVersioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceVersioning::Either => write!(f, "either"),
            ReferenceVersioning::Independent => write!(f, "independent"),
            ReferenceVersioning::Specific => write!(f, "specific"),
        }
    }
}

static RELATIVE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Za-z]+)/([A-Za-z0-9\-.]{1,64})(?:/_history/([A-Za-z0-9\-.]{1,64}))?$")
        .expect("static regex")
});

/// Literal form of a reference string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceIdentity {
    /// `#id`, or `#` for the containing resource itself
    Local { id: Option<String> },
    /// `Type/id` with an optional `/_history/version`
    Relative {
        resource_type: String,
        id: String,
        version: Option<String>,
    },
    /// Absolute url, `urn:uuid:` or `urn:oid:`
    Absolute { url: String, version: Option<String> },
    Undetermined,
}

impl ReferenceIdentity {
    pub fn parse(reference: &str) -> Self {
        if reference.is_empty() || reference.chars().any(char::is_whitespace) {
            return ReferenceIdentity::Undetermined;
        }

        if let Some(id) = reference.strip_prefix('#') {
            return ReferenceIdentity::Local {
                id: (!id.is_empty()).then(|| id.to_string()),
            };
        }

        if let Some(captures) = RELATIVE_REFERENCE.captures(reference) {
            return ReferenceIdentity::Relative {
                resource_type: captures[1].to_string(),
                id: captures[2].to_string(),
                version: captures.get(3).map(|m| m.as_str().to_string()),
            };
        }

        if reference.starts_with("urn:uuid:") || reference.starts_with("urn:oid:") {
            return ReferenceIdentity::Absolute {
                url: reference.to_string(),
                version: None,
            };
        }

        match url::Url::parse(reference) {
            Ok(parsed) if parsed.has_host() => {
                let (url, version) = split_history(reference);
                ReferenceIdentity::Absolute {
                    url: url.to_string(),
                    version: version.map(str::to_string),
                }
            }
            _ => ReferenceIdentity::Undetermined,
        }
    }

    pub fn versioning(&self) -> ReferenceVersioning {
        match self {
            ReferenceIdentity::Relative {
                version: Some(_), ..
            }
            | ReferenceIdentity::Absolute {
                version: Some(_), ..
            } => ReferenceVersioning::Specific,
            _ => ReferenceVersioning::Independent,
        }
    }

    /// Does a Bundle entry `fullUrl` identify this reference's target.
    ///
    /// Versions are ignored; relative references match any base url.
    pub fn matches_full_url(&self, full_url: &str) -> bool {
        let (full_url, _) = split_history(full_url);
        match self {
            ReferenceIdentity::Relative {
                resource_type, id, ..
            } => {
                let relative = format!("{resource_type}/{id}");
                full_url == relative || full_url.ends_with(&format!("/{relative}"))
            }
            ReferenceIdentity::Absolute { url, .. } => full_url == url,
            _ => false,
        }
    }
}

fn split_history(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once("/_history/") {
        Some((base, version)) => (base, Some(version)),
        None => (reference, None),
    }
}

/// A reference target found inside the validated instance
#[derive(Debug, Clone)]
struct LocalTarget {
    node: Arc<ElementNode>,
    location: String,
}

/// Contained resources of the enclosing resources, innermost first
struct ContainedContext<'a> {
    frames: &'a [ResourceFrame],
}

impl<'a> ContainedContext<'a> {
    fn new(state: &'a ValidationState) -> Self {
        Self {
            frames: state.resources(),
        }
    }

    fn find(&self, id: Option<&str>) -> Option<LocalTarget> {
        let Some(id) = id else {
            // `#` refers to the container itself
            let container = self
                .frames
                .iter()
                .rev()
                .find(|frame| frame.node.child("contained").is_some())
                .or_else(|| self.frames.last())?;
            return Some(LocalTarget {
                node: Arc::clone(&container.node),
                location: container.location.clone(),
            });
        };

        self.frames.iter().rev().find_map(|frame| {
            let contained: Vec<&Arc<ElementNode>> = frame.node.children_named("contained").collect();
            let index = contained.iter().position(|c| c.child_str("id") == Some(id))?;
            Some(LocalTarget {
                node: Arc::clone(contained[index]),
                location: format!(
                    "{}.contained{}",
                    frame.location,
                    index_suffix(contained.len(), index)
                ),
            })
        })
    }
}

/// Entries of the nearest enclosing Bundle
struct BundleContext<'a> {
    frame: Option<&'a ResourceFrame>,
}

impl<'a> BundleContext<'a> {
    fn new(state: &'a ValidationState) -> Self {
        Self {
            frame: state
                .resources()
                .iter()
                .rev()
                .find(|frame| frame.node.instance_type() == Some("Bundle")),
        }
    }

    fn find(&self, identity: &ReferenceIdentity) -> Option<LocalTarget> {
        let frame = self.frame?;
        let entries: Vec<&Arc<ElementNode>> = frame.node.children_named("entry").collect();
        entries.iter().enumerate().find_map(|(index, entry)| {
            let full_url = entry.child_str("fullUrl")?;
            if !identity.matches_full_url(full_url) {
                return None;
            }
            Some(LocalTarget {
                node: Arc::clone(entry.child("resource")?),
                location: format!(
                    "{}.entry{}.resource",
                    frame.location,
                    index_suffix(entries.len(), index)
                ),
            })
        })
    }
}

fn index_suffix(len: usize, index: usize) -> String {
    if len > 1 {
        format!("[{index}]")
    } else {
        String::new()
    }
}

/// Follows a reference and validates its target against `schema`
#[derive(Debug, Clone)]
pub struct ReferencedInstanceValidator {
    schema: Box<Assertion>,
    aggregation_rules: Option<Vec<AggregationMode>>,
    versioning_rule: Option<ReferenceVersioning>,
    reference_child: String,
}

impl ReferencedInstanceValidator {
    pub fn new(schema: Assertion) -> Self {
        Self {
            schema: Box::new(schema),
            aggregation_rules: None,
            versioning_rule: None,
            reference_child: "reference".to_string(),
        }
    }

    /// Only allow targets found in the given places
    pub fn with_aggregation_rules(mut self, rules: impl IntoIterator<Item = AggregationMode>) -> Self {
        self.aggregation_rules = Some(rules.into_iter().collect());
        self
    }

    pub fn with_versioning_rule(mut self, rule: ReferenceVersioning) -> Self {
        self.versioning_rule = Some(rule);
        self
    }

    /// Child holding the reference string; defaults to `reference`
    pub fn with_reference_child(mut self, name: impl Into<String>) -> Self {
        self.reference_child = name.into();
        self
    }

    pub fn schema(&self) -> &Assertion {
        &self.schema
    }

    pub fn aggregation_rules(&self) -> Option<&[AggregationMode]> {
        self.aggregation_rules.as_deref()
    }

    pub fn versioning_rule(&self) -> Option<ReferenceVersioning> {
        self.versioning_rule
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let Some(reference) = input
            .child_str(&self.reference_child)
            .or_else(|| input.value_str())
        else {
            return Ok(ResultReport::success());
        };

        let identity = ReferenceIdentity::parse(reference);
        let (kind, local) = match &identity {
            ReferenceIdentity::Undetermined => {
                return Ok(IssueAssertion::new(
                    IssueCode::UnparseableReference,
                    format!("Encountered an unparseable reference ({reference})"),
                )
                .as_result(state));
            }
            ReferenceIdentity::Local { id } => match ContainedContext::new(state).find(id.as_deref()) {
                Some(target) => (AggregationMode::Contained, Some(target)),
                None => {
                    return Ok(IssueAssertion::new(
                        IssueCode::ReferenceNotResolvable,
                        format!("Cannot resolve contained reference ({reference})"),
                    )
                    .as_result(state));
                }
            },
            _ => match BundleContext::new(state).find(&identity) {
                Some(target) => (AggregationMode::Bundled, Some(target)),
                None => (AggregationMode::Referenced, None),
            },
        };
        trace!(reference, %kind, "classified reference");

        let mut reports = Vec::new();
        if let Some(rules) = &self.aggregation_rules
            && !rules.contains(&kind)
        {
            let allowed: Vec<String> = rules.iter().map(ToString::to_string).collect();
            reports.push(
                IssueAssertion::new(
                    IssueCode::InvalidAggregation,
                    format!(
                        "Encountered a reference ({reference}) of kind '{kind}', which is not one of the allowed kinds ({})",
                        allowed.join(", ")
                    ),
                )
                .as_result(state),
            );
        }

        if let Some(rule) = self.versioning_rule
            && kind != AggregationMode::Contained
            && !rule.accepts(identity.versioning())
        {
            reports.push(
                IssueAssertion::new(
                    IssueCode::InvalidVersioning,
                    format!(
                        "Expected a {rule} reference but found a {} reference ({reference})",
                        identity.versioning()
                    ),
                )
                .as_result(state),
            );
        }

        match local {
            Some(target) => {
                debug!(reference, target = %target.location, "following reference inside the instance");
                let scoped = state.with_internal_reference(&target.location);
                reports.push(self.validate_target(&target.node, context, state, &scoped).await?);
            }
            None => reports.push(self.follow_external(reference, context, state).await?),
        }
        Ok(ResultReport::combine(reports))
    }

    /// Registry key of the target rule, kept apart from resource schema keys
    fn obligation_key(&self) -> String {
        let target = match self.schema.as_ref() {
            Assertion::Schema(schema) => schema.id().to_string(),
            Assertion::SchemaReference(rule) => rule.canonical().to_string(),
            Assertion::DynamicSchemaReference(rule) => rule.declared().to_string(),
            other => other.name().to_string(),
        };
        format!("reference->{target}")
    }

    /// Validate a target once per (rule, target identity) in this run.
    ///
    /// Re-entering a target that is still being validated yields a single
    /// cycle warning at the referencing element.
    async fn validate_target(
        &self,
        target: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
        scoped: &ValidationState,
    ) -> Result<ResultReport> {
        let key = self.obligation_key();
        let identity = scoped.instance_location().identity();
        match state.run().begin(&key, &identity) {
            Obligation::Cycle => {
                warn!(target = %identity, "reference cycle detected");
                return Ok(IssueAssertion::new(
                    IssueCode::ReferenceCycleDetected,
                    format!("Detected a reference cycle: '{identity}' is already being validated"),
                )
                .as_result(state));
            }
            Obligation::Completed(outcome) => {
                trace!(target = %identity, "reusing earlier outcome of referenced target");
                return Ok(ResultReport::new(outcome, Vec::new()));
            }
            Obligation::Started => {}
        }

        let result = self.schema.validate_one(target, context, scoped).await;
        match &result {
            Ok(report) => state.run().complete(&key, &identity, report.outcome()),
            Err(_) => state.run().abandon(&key, &identity),
        }
        result
    }

    async fn follow_external(
        &self,
        reference: &str,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let Some(resolver) = context.reference_resolver() else {
            return Ok(TraceAssertion::when_enabled(
                context,
                state,
                format!("External reference ({reference}) not followed, no resolver configured"),
            ));
        };

        let source_location = state.instance_location().to_string();
        match resolver.resolve(reference, &source_location).await {
            Ok(Some(target)) => {
                debug!(reference, "following external reference");
                let scoped = state.new_instance_scope(reference);
                let report = self.validate_target(&target, context, state, &scoped).await?;
                Ok(report.nest())
            }
            Ok(None) | Err(ReferenceError::NonExistentResource { .. }) => Ok(IssueAssertion::new(
                IssueCode::ExternalReferenceUnavailable,
                format!("Cannot resolve reference {reference}"),
            )
            .as_result(state)),
            Err(err) => {
                warn!(reference, code = %err.code(), error = %err, "reference resolver failed");
                Ok(IssueAssertion::new(
                    IssueCode::ExternalReferenceUnavailable,
                    format!("Cannot resolve reference {reference}: {err}"),
                )
                .with_severity(context.config.reference_failure.severity())
                .as_result(state))
            }
        }
    }
}
