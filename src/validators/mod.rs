//! Concrete rule implementations.

mod basic;
mod binding;
mod cardinality;
mod children;
mod fixed;
mod invariant;
mod logical;
mod min_max;
mod regex_validator;
mod schema_reference;
mod slicing;
mod type_label;

pub use basic::{DefinitionsAssertion, IssueAssertion, ResultAssertion, TraceAssertion};
pub use binding::BindingValidator;
pub use cardinality::CardinalityValidator;
pub use children::{ChildMatches, ChildrenValidator};
pub use fixed::{FixedValidator, PatternValidator, deep_partial_match};
pub use invariant::InvariantValidator;
pub use logical::{AllValidator, AnyValidator};
pub use min_max::{MaxLengthValidator, MinMaxKind, MinMaxValueValidator};
pub use regex_validator::RegexValidator;
pub use schema_reference::{DynamicSchemaReferenceValidator, SchemaReferenceValidator};
pub use slicing::{SliceCase, SliceValidator};
pub use type_label::TypeLabelValidator;

pub use crate::reference::ReferencedInstanceValidator;
