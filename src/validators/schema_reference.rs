use crate::analyzer;
use crate::assertion::Input;
use crate::canonical::Canonical;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::{ResultReport, ValidationOutcome};
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use std::sync::Arc;
use tracing::debug;

/// Validate against a schema looked up by canonical.
///
/// A canonical with an anchor (`uri#Patient.name`) addresses a sub-schema
/// in the definitions of the schema named by the uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReferenceValidator {
    canonical: Canonical,
}

impl SchemaReferenceValidator {
    pub fn new(canonical: impl Into<Canonical>) -> Self {
        Self {
            canonical: canonical.into(),
        }
    }

    pub fn canonical(&self) -> &Canonical {
        &self.canonical
    }

    pub async fn validate(
        &self,
        input: Input<'_>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let Some(schema) = self.resolve(context).await? else {
            return Ok(unresolvable(&self.canonical, state));
        };
        match input {
            Input::One(node) => schema.validate_one(node, context, state).await,
            Input::Many(nodes) => schema.validate_many(nodes, context, state).await,
        }
    }

    async fn resolve(&self, context: &ValidationContext) -> Result<Option<Arc<ElementSchema>>> {
        let schema = context.resolve_schema(&self.canonical.without_anchor()).await?;
        Ok(match (schema, self.canonical.anchor()) {
            (Some(schema), Some(anchor)) => schema.find_by_anchor(anchor).cloned(),
            (schema, None) => schema,
            (None, Some(_)) => None,
        })
    }
}

/// Validate against the schema of the node's runtime type.
///
/// Used where the declared type is abstract (`Resource`, `DomainResource`)
/// or open (`Reference.resolve()` targets): the instance itself says what it
/// is, and that type must derive from the declared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicSchemaReferenceValidator {
    declared: Canonical,
}

impl DynamicSchemaReferenceValidator {
    pub fn new(declared: impl Into<Canonical>) -> Self {
        Self {
            declared: declared.into(),
        }
    }

    pub fn declared(&self) -> &Canonical {
        &self.declared
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let target = match input.instance_type() {
            Some(runtime_type) => context.canonical_for_type(runtime_type),
            None => self.declared.clone(),
        };
        debug!(declared = %self.declared, runtime = %target, "dynamic schema dispatch");

        let fetch = analyzer::fetch_schemas(context, state, std::slice::from_ref(&target)).await?;
        let Some(schema) = fetch.schemas.first() else {
            return Ok(unresolvable(&target, state));
        };

        let consistency =
            analyzer::validate_consistency(Some(schema), Some(&self.declared), &[], state);
        if schema.is_abstract() {
            let issue = IssueAssertion::new(
                IssueCode::AbstractType,
                format!(
                    "The instance has abstract type '{target}', a concrete type is required"
                ),
            )
            .as_result(state);
            return Ok(ResultReport::combine([consistency, issue]));
        }
        let report = schema.validate_one(input, context, state).await?;
        Ok(ResultReport::combine([consistency, report]))
    }
}

fn unresolvable(canonical: &Canonical, state: &ValidationState) -> ResultReport {
    let issue = IssueAssertion::new(
        IssueCode::UnresolvableSchema,
        format!("Unable to resolve reference to schema '{canonical}'"),
    )
    .to_issue(state);
    ResultReport::new(
        ValidationOutcome::Undecided,
        vec![crate::report::Evidence::Issue(issue)],
    )
}
