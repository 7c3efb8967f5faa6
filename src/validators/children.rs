//! Structural matching of instance children against declared child rules.

use crate::assertion::Assertion;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::instance::{ElementNode, system_type_name};
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone)]
pub struct ChildrenValidator {
    children: Vec<(String, Assertion)>,
    allow_additional: bool,
}

/// Outcome of pairing declared child names with instance children
#[derive(Debug, Clone, Default)]
pub struct ChildMatches {
    /// Per declared child, in declaration order: the children it claimed
    pub matches: Vec<(String, Vec<Arc<ElementNode>>)>,
    /// Children no declaration claimed, in document order
    pub unmatched: Vec<Arc<ElementNode>>,
}

impl ChildrenValidator {
    pub fn new<N: Into<String>>(
        children: impl IntoIterator<Item = (N, Assertion)>,
        allow_additional: bool,
    ) -> Self {
        Self {
            children: children
                .into_iter()
                .map(|(name, assertion)| (name.into(), assertion))
                .collect(),
            allow_additional,
        }
    }

    pub fn children(&self) -> &[(String, Assertion)] {
        &self.children
    }

    pub fn allows_additional(&self) -> bool {
        self.allow_additional
    }

    /// Distribute `actual` over the declared names.
    ///
    /// Each declaration consumes every still-unclaimed child whose name
    /// matches it, so earlier declarations win.
    pub fn match_children(&self, actual: &[Arc<ElementNode>]) -> ChildMatches {
        let mut remaining: Vec<Arc<ElementNode>> = actual.to_vec();
        let mut matches = Vec::with_capacity(self.children.len());
        for (declared, _) in &self.children {
            let (claimed, rest): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|child| name_matches(declared, child));
            remaining = rest;
            matches.push((declared.clone(), claimed));
        }
        ChildMatches {
            matches,
            unmatched: remaining,
        }
    }

    pub async fn validate_one(
        &self,
        input: &Arc<ElementNode>,
        context: &ValidationContext,
        state: &ValidationState,
    ) -> Result<ResultReport> {
        let actual = children_of(input);
        let ChildMatches { matches, unmatched } = self.match_children(&actual);

        let mut reports = Vec::with_capacity(matches.len() + 1);
        if !unmatched.is_empty() && !self.allow_additional {
            let names: Vec<&str> = unmatched.iter().map(|c| c.name()).collect();
            reports.push(
                IssueAssertion::new(
                    IssueCode::UnknownChild,
                    format!("Encountered unknown child elements '{}'", names.join("', '")),
                )
                .as_result(state),
            );
        }

        for ((declared, claimed), (_, assertion)) in matches.iter().zip(&self.children) {
            trace!(declared = %declared, count = claimed.len(), "matched children");
            let child_state = child_state(state, declared, claimed);
            reports.push(assertion.validate_many(claimed, context, &child_state).await?);
        }
        Ok(ResultReport::combine(reports))
    }
}

/// Children of a node; a bare primitive exposes its value as a `value` child
fn children_of(input: &ElementNode) -> Vec<Arc<ElementNode>> {
    match input.value() {
        Some(value) if !input.has_children() => vec![Arc::new(ElementNode::primitive(
            "value",
            system_type_name(value),
            value.clone(),
        ))],
        _ => input.children().to_vec(),
    }
}

fn child_state(state: &ValidationState, declared: &str, claimed: &[Arc<ElementNode>]) -> ValidationState {
    let definition = state.with_definition_child(declared);
    let Some(first) = claimed.first() else {
        return definition.with_child(declared.trim_end_matches("[x]"));
    };
    let is_choice = declared.ends_with("[x]") || declared != first.name();
    match first.instance_type() {
        Some(choice_type) if is_choice => definition.with_choice_child(first.name(), choice_type),
        _ => definition.with_child(first.name()),
    }
}

fn name_matches(declared: &str, child: &ElementNode) -> bool {
    let name = child.name();
    if declared == name {
        return true;
    }
    if let Some(stem) = declared.strip_suffix("[x]") {
        return stem == name;
    }
    child
        .instance_type()
        .is_some_and(|t| declared.len() == name.len() + t.len() && declared == format!("{name}{}", capitalize(t)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
