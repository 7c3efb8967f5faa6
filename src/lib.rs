//! # OctoFHIR Validator
//!
//! Runtime rule-evaluation engine for FHIR profile validation. Compiled
//! schemas are trees of [`Assertion`]s; validating an instance walks the
//! tree and combines the [`ResultReport`] of every rule into one outcome
//! with an evidence trail.
//!
//! ## Features
//!
//! - **Outcome algebra**: three-valued outcomes combined so the weakest wins
//! - **Structural matching**: declared children, choice types and cardinality
//! - **Slicing**: discriminator-driven partitioning with ordering rules
//! - **Profile analysis**: minimal schema sets and declared/runtime type consistency
//! - **References**: contained, bundled and external targets with cycle detection
//!
//! Compiling StructureDefinitions into schemas, evaluating FHIRPath and
//! serving terminology are left to collaborators plugged into the
//! [`ValidationContext`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_validator::*;
//! use octofhir_validator::validators::{CardinalityValidator, ChildrenValidator};
//!
//! # fn example() -> Result<()> {
//! let schema = ElementSchema::new(
//!     "http://example.org/StructureDefinition/Patient",
//!     vec![Assertion::Children(ChildrenValidator::new(
//!         [("active", Assertion::Cardinality(CardinalityValidator::new(Some(1), Some(1))?))],
//!         false,
//!     ))],
//! );
//! let patient = ElementNode::from_json(&serde_json::json!({
//!     "resourceType": "Patient",
//!     "active": true
//! }));
//!
//! let report = Validator::default().validate_one_blocking(&schema, &patient)?;
//! assert!(report.is_successful());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod assertion;
pub mod canonical;
pub mod config;
pub mod context;
pub mod error;
pub mod expression;
pub mod instance;
pub mod issue;
pub mod location;
pub mod reference;
pub mod render;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod state;
pub mod terminology;
pub mod validator;
pub mod validators;

pub use assertion::{Assertion, ExternalAssertion, Input, Shape};
pub use canonical::Canonical;
pub use config::{BestPracticeMode, ServiceFailurePolicy, ValidationConfig};
pub use context::{CancellationToken, MetaProfileSelector, TypeNameMapper, ValidationContext};
pub use error::{Result, ValidationError};
pub use expression::{EvaluationContext, ExpressionError, ExpressionEvaluator};
pub use instance::ElementNode;
pub use issue::{IssueCode, Severity};
pub use location::{DefinitionPath, InstancePath};
pub use reference::{
    AggregationMode, ExternalReferenceResolver, FnReferenceResolver, InMemoryReferenceResolver,
    ReferenceError, ReferenceIdentity, ReferenceVersioning,
};
pub use report::{Evidence, ResultReport, TraceNote, ValidationIssue, ValidationOutcome};
pub use resolver::{CachedSchemaResolver, InMemorySchemaResolver, SchemaResolver};
pub use schema::{ElementSchema, SchemaKind, StructureDefinitionInfo};
pub use state::ValidationState;
pub use terminology::{BindingStrength, CodeMembership, TerminologyService};
pub use validator::Validator;
