//! The rule abstraction.
//!
//! An [`Assertion`] is one immutable node of a compiled schema graph. Rules
//! come in two evaluation shapes: some judge a single node, some judge the
//! whole group of siblings sharing a name (cardinality, slicing). Every
//! variant declares its [`Shape`] statically, and the dispatch below adapts
//! the two contracts to each other:
//!
//! * a group-only rule asked about one node sees a one-element group,
//! * a single-only rule asked about a group passes an empty group, delegates
//!   a one-element group, and rejects anything larger with
//!   [`ValidationError::GroupShapeMismatch`].
//!
//! Schemas apply single-only members element by element themselves, so the
//! last case only surfaces when a rule is dispatched by hand.

use crate::context::ValidationContext;
use crate::error::{Result, ValidationError};
use crate::instance::ElementNode;
use crate::report::ResultReport;
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::validators::{
    AllValidator, AnyValidator, BindingValidator, CardinalityValidator, ChildrenValidator,
    DefinitionsAssertion, DynamicSchemaReferenceValidator, FixedValidator, InvariantValidator,
    IssueAssertion, MaxLengthValidator, MinMaxValueValidator, PatternValidator,
    ReferencedInstanceValidator, RegexValidator, ResultAssertion, SchemaReferenceValidator,
    SliceValidator, TraceAssertion, TypeLabelValidator,
};
use async_recursion::async_recursion;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt::Debug;
use std::sync::Arc;

/// Evaluation shapes a rule supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub single: bool,
    pub group: bool,
}

impl Shape {
    pub const SINGLE: Shape = Shape {
        single: true,
        group: false,
    };
    pub const GROUP: Shape = Shape {
        single: false,
        group: true,
    };
    pub const BOTH: Shape = Shape {
        single: true,
        group: true,
    };
}

/// Input handed to a rule: one node or a group of siblings
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    One(&'a Arc<ElementNode>),
    Many(&'a [Arc<ElementNode>]),
}

/// Rule kinds supplied from outside the crate
#[async_trait]
pub trait ExternalAssertion: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn shape(&self) -> Shape {
        Shape::SINGLE
    }

    async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport>;

    /// Group evaluation; only called when [`shape`](Self::shape) includes groups
    async fn validate_many(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let mut reports = Vec::with_capacity(input.len());
        for node in input {
            reports.push(self.validate_one(node, context, state).await?);
        }
        Ok(ResultReport::combine(reports))
    }

    fn to_json(&self) -> JsonValue {
        JsonValue::String(self.name().to_string())
    }
}

#[derive(Debug, Clone)]
pub enum Assertion {
    Result(ResultAssertion),
    Issue(IssueAssertion),
    Trace(TraceAssertion),
    Definitions(DefinitionsAssertion),
    Cardinality(CardinalityValidator),
    Fixed(FixedValidator),
    Pattern(PatternValidator),
    Regex(RegexValidator),
    MinMaxValue(MinMaxValueValidator),
    MaxLength(MaxLengthValidator),
    TypeLabel(TypeLabelValidator),
    Invariant(InvariantValidator),
    Binding(BindingValidator),
    All(AllValidator),
    Any(AnyValidator),
    Children(ChildrenValidator),
    Slice(SliceValidator),
    Schema(Arc<ElementSchema>),
    SchemaReference(SchemaReferenceValidator),
    DynamicSchemaReference(DynamicSchemaReferenceValidator),
    Reference(ReferencedInstanceValidator),
    External(Arc<dyn ExternalAssertion>),
}

impl Assertion {
    pub fn shape(&self) -> Shape {
        match self {
            Assertion::Result(_)
            | Assertion::Trace(_)
            | Assertion::Definitions(_)
            | Assertion::All(_)
            | Assertion::Any(_)
            | Assertion::Schema(_)
            | Assertion::SchemaReference(_) => Shape::BOTH,
            Assertion::Cardinality(_) | Assertion::Slice(_) => Shape::GROUP,
            Assertion::Issue(_)
            | Assertion::Fixed(_)
            | Assertion::Pattern(_)
            | Assertion::Regex(_)
            | Assertion::MinMaxValue(_)
            | Assertion::MaxLength(_)
            | Assertion::TypeLabel(_)
            | Assertion::Invariant(_)
            | Assertion::Binding(_)
            | Assertion::Children(_)
            | Assertion::DynamicSchemaReference(_)
            | Assertion::Reference(_) => Shape::SINGLE,
            Assertion::External(ext) => ext.shape(),
        }
    }

    /// Short kind name, used in errors and rendering
    pub fn name(&self) -> &str {
        match self {
            Assertion::Result(_) => "result",
            Assertion::Issue(_) => "issue",
            Assertion::Trace(_) => "trace",
            Assertion::Definitions(_) => "definitions",
            Assertion::Cardinality(_) => "cardinality",
            Assertion::Fixed(_) => "fixed",
            Assertion::Pattern(_) => "pattern",
            Assertion::Regex(_) => "regex",
            Assertion::MinMaxValue(v) => v.kind().name(),
            Assertion::MaxLength(_) => "maxLength",
            Assertion::TypeLabel(_) => "type",
            Assertion::Invariant(_) => "invariant",
            Assertion::Binding(_) => "binding",
            Assertion::All(_) => "allOf",
            Assertion::Any(_) => "anyOf",
            Assertion::Children(_) => "children",
            Assertion::Slice(_) => "slicing",
            Assertion::Schema(_) => "schema",
            Assertion::SchemaReference(_) => "ref",
            Assertion::DynamicSchemaReference(_) => "dynamicRef",
            Assertion::Reference(_) => "validate",
            Assertion::External(ext) => ext.name(),
        }
    }

    pub async fn validate(
        &self,
        input: Input<'_>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        match input {
            Input::One(node) => self.validate_one(node, context, state).await,
            Input::Many(nodes) => self.validate_many(nodes, context, state).await,
        }
    }

    /// Evaluate this rule against a single node
    #[async_recursion]
    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let one = std::slice::from_ref(input);
        match self {
            Assertion::Result(v) => Ok(v.report()),
            Assertion::Issue(v) => Ok(v.as_result(state)),
            Assertion::Trace(v) => Ok(v.report(state)),
            Assertion::Definitions(_) => Ok(ResultReport::success()),
            Assertion::Cardinality(v) => Ok(v.validate_many(one, state)),
            Assertion::Fixed(v) => Ok(v.validate_one(input, state)),
            Assertion::Pattern(v) => Ok(v.validate_one(input, state)),
            Assertion::Regex(v) => Ok(v.validate_one(input, state)),
            Assertion::MinMaxValue(v) => Ok(v.validate_one(input, state)),
            Assertion::MaxLength(v) => Ok(v.validate_one(input, state)),
            Assertion::TypeLabel(v) => Ok(v.validate_one(input, state)),
            Assertion::Invariant(v) => v.validate_one(input, context, state).await,
            Assertion::Binding(v) => v.validate_one(input, context, state).await,
            Assertion::All(v) => v.validate(Input::One(input), context, state).await,
            Assertion::Any(v) => v.validate(Input::One(input), context, state).await,
            Assertion::Children(v) => v.validate_one(input, context, state).await,
            Assertion::Slice(v) => v.validate_many(one, context, state).await,
            Assertion::Schema(schema) => schema.validate_one(input, context, state).await,
            Assertion::SchemaReference(v) => v.validate(Input::One(input), context, state).await,
            Assertion::DynamicSchemaReference(v) => v.validate_one(input, context, state).await,
            Assertion::Reference(v) => v.validate_one(input, context, state).await,
            Assertion::External(ext) if ext.shape().single => {
                ext.validate_one(input, context, state).await
            }
            Assertion::External(ext) => ext.validate_many(one, context, state).await,
        }
    }

    /// Evaluate this rule against a group of sibling nodes
    #[async_recursion]
    pub async fn validate_many(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        match self {
            Assertion::Result(v) => Ok(v.report()),
            Assertion::Trace(v) => Ok(v.report(state)),
            Assertion::Definitions(_) => Ok(ResultReport::success()),
            Assertion::Cardinality(v) => Ok(v.validate_many(input, state)),
            Assertion::All(v) => v.validate(Input::Many(input), context, state).await,
            Assertion::Any(v) => v.validate(Input::Many(input), context, state).await,
            Assertion::Slice(v) => v.validate_many(input, context, state).await,
            Assertion::Schema(schema) => schema.validate_many(input, context, state).await,
            Assertion::SchemaReference(v) => v.validate(Input::Many(input), context, state).await,
            Assertion::External(ext) if ext.shape().group => {
                ext.validate_many(input, context, state).await
            }
            _ => match input {
                [] => Ok(ResultReport::success()),
                [single] => self.validate_one(single, context, state).await,
                _ => Err(ValidationError::group_shape_mismatch(
                    self.name(),
                    input.len(),
                    state.instance_location().to_string(),
                )),
            },
        }
    }
}

impl From<ElementSchema> for Assertion {
    fn from(schema: ElementSchema) -> Self {
        Assertion::Schema(Arc::new(schema))
    }
}

impl From<Arc<ElementSchema>> for Assertion {
    fn from(schema: Arc<ElementSchema>) -> Self {
        Assertion::Schema(schema)
    }
}
