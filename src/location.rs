//! Instance locations and definition paths.
//!
//! Both paths are immutable values; descending creates an extended copy so a
//! parent state is never disturbed by its children.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum InstanceSegment {
    Root(String),
    Child {
        name: String,
        choice_type: Option<String>,
    },
    Index(usize),
    /// Descent through a resolved reference; the value is the target's location
    InternalReference(String),
}

/// Location of a node inside the validated instance, e.g. `Bundle.entry[1].resource`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstancePath {
    segments: Vec<InstanceSegment>,
}

impl InstancePath {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![InstanceSegment::Root(name.into())],
        }
    }

    pub fn child(&self, name: &str) -> Self {
        self.push(InstanceSegment::Child {
            name: name.to_string(),
            choice_type: None,
        })
    }

    /// Child of a choice element, rendered as `value.ofType(Quantity)`
    pub fn choice_child(&self, name: &str, choice_type: &str) -> Self {
        self.push(InstanceSegment::Child {
            name: name.to_string(),
            choice_type: Some(choice_type.to_string()),
        })
    }

    pub fn index(&self, index: usize) -> Self {
        self.push(InstanceSegment::Index(index))
    }

    /// Continue at a reference target found elsewhere in the same instance
    pub fn internal_reference(&self, target_location: impl Into<String>) -> Self {
        self.push(InstanceSegment::InternalReference(target_location.into()))
    }

    fn push(&self, segment: InstanceSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Stable identity of the addressed node.
    ///
    /// Two paths reaching the same node through different references share
    /// an identity: only the segments after the last internal reference
    /// marker count, prefixed by that marker's target location.
    pub fn identity(&self) -> String {
        let start = self
            .segments
            .iter()
            .rposition(|s| matches!(s, InstanceSegment::InternalReference(_)))
            .unwrap_or(0);
        render(&self.segments[start..])
    }
}

fn render(segments: &[InstanceSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            InstanceSegment::Root(name) => out.push_str(name),
            InstanceSegment::Child { name, choice_type } => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
                if let Some(t) = choice_type {
                    out.push_str(&format!(".ofType({t})"));
                }
            }
            InstanceSegment::Index(i) => out.push_str(&format!("[{i}]")),
            InstanceSegment::InternalReference(target) => {
                out.clear();
                out.push_str(target);
            }
        }
    }
    out
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.segments))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DefinitionStep {
    Schema(String),
    Child(String),
    Slice(String),
}

/// Route through the schema graph, e.g. `Patient.name->HumanName.given`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefinitionPath {
    steps: Vec<DefinitionStep>,
}

impl DefinitionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self, id: &str) -> Self {
        self.push(DefinitionStep::Schema(id.to_string()))
    }

    pub fn child(&self, name: &str) -> Self {
        self.push(DefinitionStep::Child(name.to_string()))
    }

    pub fn slice(&self, name: &str) -> Self {
        self.push(DefinitionStep::Slice(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(&self, step: DefinitionStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl fmt::Display for DefinitionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                DefinitionStep::Schema(id) if i == 0 => write!(f, "{id}")?,
                DefinitionStep::Schema(id) => write!(f, "->{id}")?,
                DefinitionStep::Child(name) => write!(f, ".{name}")?,
                DefinitionStep::Slice(name) => write!(f, ":{name}")?,
            }
        }
        Ok(())
    }
}
