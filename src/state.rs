//! Per-run validation state.
//!
//! A [`ValidationState`] travels down the evaluation by reference. Descending
//! into a child produces an extended copy; the [`RunState`] behind it is shared
//! by every copy made during one top-level call.

use crate::instance::ElementNode;
use crate::location::{DefinitionPath, InstancePath};
use crate::report::ValidationOutcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::trace;

/// A resource enclosing the node under validation
#[derive(Debug, Clone)]
pub struct ResourceFrame {
    pub node: Arc<ElementNode>,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct ValidationState {
    instance: InstancePath,
    definition: DefinitionPath,
    resources: Vec<ResourceFrame>,
    run: Arc<RunState>,
}

impl ValidationState {
    /// Fresh state for a top-level call
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            instance: InstancePath::root(root),
            definition: DefinitionPath::new(),
            resources: Vec::new(),
            run: Arc::new(RunState::default()),
        }
    }

    pub fn instance_location(&self) -> &InstancePath {
        &self.instance
    }

    pub fn definition_path(&self) -> &DefinitionPath {
        &self.definition
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    /// Enclosing resources, outermost first
    pub fn resources(&self) -> &[ResourceFrame] {
        &self.resources
    }

    pub fn current_resource(&self) -> Option<&ResourceFrame> {
        self.resources.last()
    }

    pub fn root_resource(&self) -> Option<&ResourceFrame> {
        self.resources.first()
    }

    pub fn with_child(&self, name: &str) -> Self {
        self.with_instance(self.instance.child(name))
    }

    pub fn with_choice_child(&self, name: &str, choice_type: &str) -> Self {
        self.with_instance(self.instance.choice_child(name, choice_type))
    }

    pub fn with_index(&self, index: usize) -> Self {
        self.with_instance(self.instance.index(index))
    }

    pub fn with_internal_reference(&self, target_location: &str) -> Self {
        self.with_instance(self.instance.internal_reference(target_location))
    }

    pub fn with_schema(&self, id: &str) -> Self {
        self.with_definition(self.definition.schema(id))
    }

    pub fn with_definition_child(&self, name: &str) -> Self {
        self.with_definition(self.definition.child(name))
    }

    pub fn with_slice(&self, name: &str) -> Self {
        self.with_definition(self.definition.slice(name))
    }

    /// Push the resource being validated at the current location
    pub fn with_resource(&self, node: Arc<ElementNode>) -> Self {
        let mut next = self.clone();
        next.resources.push(ResourceFrame {
            node,
            location: self.instance.to_string(),
        });
        next
    }

    /// Start a new instance scope for an externally resolved target.
    ///
    /// The location restarts at `root`, the enclosing resources are dropped
    /// and the run registry stays shared.
    pub fn new_instance_scope(&self, root: impl Into<String>) -> Self {
        Self {
            instance: InstancePath::root(root),
            definition: self.definition.clone(),
            resources: Vec::new(),
            run: Arc::clone(&self.run),
        }
    }

    fn with_instance(&self, instance: InstancePath) -> Self {
        Self {
            instance,
            ..self.clone()
        }
    }

    fn with_definition(&self, definition: DefinitionPath) -> Self {
        Self {
            definition,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObligationStatus {
    InProgress,
    Completed(ValidationOutcome),
}

/// Answer of the re-entrancy registry when an obligation is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obligation {
    /// First visit; the caller must validate and then complete it
    Started,
    /// The same obligation is already being validated further up
    Cycle,
    /// Already validated during this run
    Completed(ValidationOutcome),
}

/// State shared by every step of one top-level validation call
#[derive(Debug, Default)]
pub struct RunState {
    obligations: Mutex<HashMap<(String, String), ObligationStatus>>,
    resources_validated: AtomicUsize,
}

impl RunState {
    /// Enter the obligation of validating `identity` against `schema_id`
    pub fn begin(&self, schema_id: &str, identity: &str) -> Obligation {
        let mut obligations = self
            .obligations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = (schema_id.to_string(), identity.to_string());
        match obligations.get(&key) {
            Some(ObligationStatus::InProgress) => Obligation::Cycle,
            Some(ObligationStatus::Completed(outcome)) => Obligation::Completed(*outcome),
            None => {
                trace!(schema = schema_id, identity, "entering obligation");
                obligations.insert(key, ObligationStatus::InProgress);
                Obligation::Started
            }
        }
    }

    pub fn complete(&self, schema_id: &str, identity: &str, outcome: ValidationOutcome) {
        let mut obligations = self
            .obligations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        obligations.insert(
            (schema_id.to_string(), identity.to_string()),
            ObligationStatus::Completed(outcome),
        );
    }

    /// Forget an obligation whose validation was aborted
    pub fn abandon(&self, schema_id: &str, identity: &str) {
        let mut obligations = self
            .obligations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        obligations.remove(&(schema_id.to_string(), identity.to_string()));
    }

    /// Count a resource validation that actually ran
    pub fn record_resource(&self) {
        self.resources_validated.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of resource validations actually performed in this run
    pub fn resources_validated(&self) -> usize {
        self.resources_validated.load(Ordering::Relaxed)
    }
}
