//! Compiled schemas.
//!
//! An [`ElementSchema`] is a named bag of member assertions. Its kind decides
//! how instances enter it:
//!
//! - `Element` and `Datatype` schemas run their members,
//! - `Resource` schemas additionally honor `meta.profile`, track the
//!   resource in the run's re-entrancy registry and push it as the enclosing
//!   resource for everything below,
//! - `Extension` schemas group their input by `url` and pull in the schema
//!   each url names.

use crate::analyzer;
use crate::assertion::Assertion;
use crate::canonical::Canonical;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::ElementNode;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::{Obligation, ValidationState};
use crate::validators::IssueAssertion;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    #[default]
    Element,
    Resource,
    Datatype,
    Extension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Derivation {
    Specialization,
    Constraint,
}

/// What a schema compiled from a StructureDefinition knows about its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinitionInfo {
    pub canonical: Canonical,
    /// Every ancestor, nearest first
    #[serde(default)]
    pub base_canonicals: Vec<Canonical>,
    pub data_type: String,
    pub derivation: Option<Derivation>,
    #[serde(default)]
    pub is_abstract: bool,
}

impl StructureDefinitionInfo {
    pub fn new(canonical: impl Into<Canonical>, data_type: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            base_canonicals: Vec::new(),
            data_type: data_type.into(),
            derivation: None,
            is_abstract: false,
        }
    }

    pub fn with_bases(mut self, bases: impl IntoIterator<Item = impl Into<Canonical>>) -> Self {
        self.base_canonicals = bases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ElementSchema {
    id: Canonical,
    kind: SchemaKind,
    structure: Option<StructureDefinitionInfo>,
    members: Vec<Assertion>,
}

impl ElementSchema {
    /// Plain element schema
    pub fn new(id: impl Into<Canonical>, members: Vec<Assertion>) -> Self {
        Self {
            id: id.into(),
            kind: SchemaKind::Element,
            structure: None,
            members,
        }
    }

    pub fn resource(structure: StructureDefinitionInfo, members: Vec<Assertion>) -> Self {
        Self::with_structure(SchemaKind::Resource, structure, members)
    }

    pub fn datatype(structure: StructureDefinitionInfo, members: Vec<Assertion>) -> Self {
        Self::with_structure(SchemaKind::Datatype, structure, members)
    }

    pub fn extension(structure: StructureDefinitionInfo, members: Vec<Assertion>) -> Self {
        Self::with_structure(SchemaKind::Extension, structure, members)
    }

    fn with_structure(
        kind: SchemaKind,
        structure: StructureDefinitionInfo,
        members: Vec<Assertion>,
    ) -> Self {
        Self {
            id: structure.canonical.clone(),
            kind,
            structure: Some(structure),
            members,
        }
    }

    pub fn id(&self) -> &Canonical {
        &self.id
    }

    /// Whether this schema describes an abstract type, which no instance may have
    pub fn is_abstract(&self) -> bool {
        self.structure.as_ref().is_some_and(|s| s.is_abstract)
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn structure(&self) -> Option<&StructureDefinitionInfo> {
        self.structure.as_ref()
    }

    pub fn members(&self) -> &[Assertion] {
        &self.members
    }

    pub fn base_canonicals(&self) -> &[Canonical] {
        self.structure
            .as_ref()
            .map(|s| s.base_canonicals.as_slice())
            .unwrap_or(&[])
    }

    /// Whether this schema is `canonical` or derives from it, ignoring versions
    pub fn is_derived_from(&self, canonical: &Canonical) -> bool {
        self.id.uri() == canonical.uri()
            || self
                .base_canonicals()
                .iter()
                .any(|base| base.uri() == canonical.uri())
    }

    /// Look up a sub-schema registered in this schema's definitions
    pub fn find_by_anchor(&self, anchor: &str) -> Option<&Arc<ElementSchema>> {
        self.members
            .iter()
            .filter_map(|member| match member {
                Assertion::Definitions(definitions) => Some(definitions.schemas()),
                _ => None,
            })
            .flatten()
            .find(|schema| schema.id().anchor() == Some(anchor))
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        context.check_cancelled(state)?;
        match self.kind {
            SchemaKind::Resource => self.validate_resource(input, context, state).await,
            SchemaKind::Extension => {
                self.validate_extensions(std::slice::from_ref(input), context, state)
                    .await
            }
            SchemaKind::Element | SchemaKind::Datatype => {
                self.validate_members_one(input, context, state).await
            }
        }
    }

    pub async fn validate_many(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        context.check_cancelled(state)?;
        // An absent element only answers to cardinality, whatever the kind
        if input.is_empty() {
            return self.validate_members_many(input, context, state).await;
        }
        match self.kind {
            SchemaKind::Resource => {
                let mut reports = Vec::with_capacity(input.len());
                for (index, node) in input.iter().enumerate() {
                    let element_state = indexed(state, input.len(), index);
                    reports.push(self.validate_resource(node, context, &element_state).await?);
                }
                Ok(ResultReport::combine(reports))
            }
            SchemaKind::Extension => self.validate_extensions(input, context, state).await,
            SchemaKind::Element | SchemaKind::Datatype => {
                self.validate_members_many(input, context, state).await
            }
        }
    }

    async fn validate_members_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let state = state.with_schema(self.id.as_str());
        let mut reports = Vec::with_capacity(self.members.len());
        for member in self.members.iter().filter(|m| context.accepts(m)) {
            reports.push(member.validate_one(input, context, &state).await?);
        }
        Ok(ResultReport::combine(reports))
    }

    /// Group contract: group rules see the whole group, single-node rules
    /// are applied to every element in turn
    async fn validate_members_many(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let state = state.with_schema(self.id.as_str());
        let mut reports = Vec::new();

        if input.is_empty() {
            for member in &self.members {
                if matches!(member, Assertion::Cardinality(_)) && context.accepts(member) {
                    reports.push(member.validate_many(input, context, &state).await?);
                }
            }
            return Ok(ResultReport::combine(reports));
        }

        for member in self.members.iter().filter(|m| context.accepts(m)) {
            if member.shape().group {
                reports.push(member.validate_many(input, context, &state).await?);
                continue;
            }
            for (index, node) in input.iter().enumerate() {
                let element_state = indexed(&state, input.len(), index);
                reports.push(member.validate_one(node, context, &element_state).await?);
            }
        }
        Ok(ResultReport::combine(reports))
    }

    async fn validate_resource(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let declared: Vec<Canonical> = input
            .children_named("meta")
            .flat_map(|meta| meta.children_named("profile"))
            .filter_map(|profile| profile.value_str())
            .map(Canonical::from)
            .collect();
        let location = state.instance_location().to_string();
        let selected = context.select_profiles(&location, declared);

        let mut reports = Vec::new();
        let mut fetched = Vec::new();
        if !selected.is_empty() {
            debug!(%location, profiles = selected.len(), "validating declared profiles");
            let fetch = analyzer::fetch_schemas(context, state, &selected).await?;
            reports.extend(fetch.errors);
            reports.push(analyzer::validate_consistency(
                Some(self),
                None,
                &fetch.schemas,
                state,
            ));
            fetched = fetch.schemas;
        }

        let mut candidates: Vec<&ElementSchema> = vec![self];
        candidates.extend(fetched.iter().map(Arc::as_ref));
        for schema in analyzer::calculate_minimal_set(&candidates) {
            reports.push(schema.validate_tracked(input, context, state).await?);
        }
        Ok(ResultReport::combine(reports))
    }

    /// Validate a resource through the run's re-entrancy registry
    async fn validate_tracked(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let identity = state.instance_location().identity();
        match state.run().begin(self.id.as_str(), &identity) {
            Obligation::Cycle => {
                warn!(schema = %self.id, %identity, "reference cycle detected");
                return Ok(IssueAssertion::new(
                    IssueCode::ReferenceCycleDetected,
                    format!(
                        "Detected a reference cycle: '{identity}' is already being validated against '{}'",
                        self.id
                    ),
                )
                .as_result(state));
            }
            Obligation::Completed(outcome) => {
                trace!(schema = %self.id, %identity, "reusing earlier outcome");
                return Ok(ResultReport::new(outcome, Vec::new()));
            }
            Obligation::Started => state.run().record_resource(),
        }

        let scoped = state.with_resource(Arc::clone(input));
        let result = self.validate_members_one(input, context, &scoped).await;
        match &result {
            Ok(report) => state
                .run()
                .complete(self.id.as_str(), &identity, report.outcome()),
            Err(_) => state.run().abandon(self.id.as_str(), &identity),
        }
        result
    }

    async fn validate_extensions(
        &self,
        input: &[Arc<ElementNode>],
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let mut reports = Vec::new();
        for (url, group) in group_by_url(input) {
            let Some(url) = url else {
                reports.push(
                    IssueAssertion::new(
                        IssueCode::MissingExtensionUrl,
                        "The extension has no url, so its definition cannot be determined",
                    )
                    .as_result(state),
                );
                reports.push(self.validate_members_many(&group, context, state).await?);
                continue;
            };

            let canonical = Canonical::new(url);
            // Relative urls name sub-extensions of a complex extension
            if !canonical.is_absolute() || canonical.uri() == self.id.uri() {
                reports.push(self.validate_members_many(&group, context, state).await?);
                continue;
            }

            let fetch = analyzer::fetch_schemas(context, state, std::slice::from_ref(&canonical)).await?;
            reports.extend(fetch.errors);
            reports.push(analyzer::validate_consistency(
                Some(self),
                None,
                &fetch.schemas,
                state,
            ));
            let mut candidates: Vec<&ElementSchema> = vec![self];
            candidates.extend(fetch.schemas.iter().map(Arc::as_ref));
            for schema in analyzer::calculate_minimal_set(&candidates) {
                reports.push(schema.validate_members_many(&group, context, state).await?);
            }
        }
        Ok(ResultReport::combine(reports))
    }
}

fn indexed(state: &ValidationState, len: usize, index: usize) -> ValidationState {
    if len > 1 {
        state.with_index(index)
    } else {
        state.clone()
    }
}

/// Group extensions by their url, keeping first-seen order
fn group_by_url(input: &[Arc<ElementNode>]) -> Vec<(Option<String>, Vec<Arc<ElementNode>>)> {
    let mut groups: Vec<(Option<String>, Vec<Arc<ElementNode>>)> = Vec::new();
    for node in input {
        let url = node.child_str("url").map(str::to_string);
        match groups.iter_mut().find(|(u, _)| *u == url) {
            Some((_, members)) => members.push(Arc::clone(node)),
            None => groups.push((url, vec![Arc::clone(node)])),
        }
    }
    groups
}
