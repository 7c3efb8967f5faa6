//! Instance tree consumed by the validation engine.
//!
//! The engine never looks at JSON or XML directly. Everything it validates is
//! an [`ElementNode`]: a name, an optional runtime type label, an optional
//! primitive value and ordered children. Nodes are shared through [`Arc`] so
//! reference resolution can hand out targets without copying subtrees.
//!
//! Locations are not stored on the nodes; the
//! [`ValidationState`](crate::state::ValidationState) tracks them while the
//! engine descends.

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementNode {
    name: String,
    instance_type: Option<String>,
    value: Option<JsonValue>,
    children: Vec<Arc<ElementNode>>,
}

impl ElementNode {
    /// Create an untyped node without value or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a resource root node, named and typed after the resource type
    pub fn resource(resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        Self {
            name: resource_type.clone(),
            instance_type: Some(resource_type),
            ..Default::default()
        }
    }

    /// Create a primitive-valued node
    pub fn primitive(
        name: impl Into<String>,
        instance_type: impl Into<String>,
        value: impl Into<JsonValue>,
    ) -> Self {
        Self {
            name: name.into(),
            instance_type: Some(instance_type.into()),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<JsonValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn with_shared_child(mut self, child: Arc<ElementNode>) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ElementNode>) -> Self {
        self.children.extend(children.into_iter().map(Arc::new));
        self
    }

    /// Rename the node, keeping type, value and children
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance_type(&self) -> Option<&str> {
        self.instance_type.as_deref()
    }

    pub fn value(&self) -> Option<&JsonValue> {
        self.value.as_ref()
    }

    /// Primitive value as a string, if it is one
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(|v| v.as_str())
    }

    pub fn children(&self) -> &[Arc<ElementNode>] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// All children with the given name, in document order
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<ElementNode>> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Arc<ElementNode>> {
        self.children.iter().find(|c| c.name == name)
    }

    /// String value of the first child with the given name
    pub fn child_str(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.value_str())
    }

    /// Build a tree from FHIR-style JSON.
    ///
    /// Objects carrying `resourceType` become resource nodes typed after it,
    /// arrays become repeated children sharing the property name and scalars
    /// are typed by their JSON kind. Choice properties (`valueQuantity`) keep
    /// their full name; typed sources should use the builder methods instead.
    /// Primitive extension properties (`_given`) are skipped.
    pub fn from_json(value: &JsonValue) -> Arc<ElementNode> {
        let name = value
            .get("resourceType")
            .and_then(|rt| rt.as_str())
            .unwrap_or("$root");
        Arc::new(Self::from_json_named(name, value))
    }

    fn from_json_named(name: &str, value: &JsonValue) -> ElementNode {
        match value {
            JsonValue::Object(map) => {
                let mut node = ElementNode::new(name);
                node.instance_type = map
                    .get("resourceType")
                    .and_then(|rt| rt.as_str())
                    .map(str::to_string);
                for (key, child) in map {
                    if key == "resourceType" || key.starts_with('_') {
                        continue;
                    }
                    match child {
                        JsonValue::Array(items) => {
                            for item in items {
                                node.children
                                    .push(Arc::new(Self::from_json_named(key, item)));
                            }
                        }
                        other => node
                            .children
                            .push(Arc::new(Self::from_json_named(key, other))),
                    }
                }
                node
            }
            scalar => ElementNode {
                name: name.to_string(),
                instance_type: Some(json_type_name(scalar).to_string()),
                value: Some(scalar.clone()),
                children: Vec::new(),
            },
        }
    }

    /// Render this node back to JSON.
    ///
    /// Children appearing more than once become arrays; a child appearing
    /// once is rendered as a single value. Comparisons that care about
    /// array-ness treat a one-element array and its element as equivalent.
    pub fn to_json(&self) -> JsonValue {
        if self.children.is_empty() {
            return self.value.clone().unwrap_or(JsonValue::Null);
        }

        let mut grouped: Vec<(&str, Vec<JsonValue>)> = Vec::new();
        for child in &self.children {
            let rendered = child.to_json();
            match grouped.iter_mut().find(|(n, _)| *n == child.name) {
                Some((_, values)) => values.push(rendered),
                None => grouped.push((&child.name, vec![rendered])),
            }
        }

        let mut map = Map::new();
        if let Some(value) = &self.value {
            map.insert("value".to_string(), value.clone());
        }
        for (name, mut values) in grouped {
            let rendered = if values.len() == 1 {
                values.remove(0)
            } else {
                JsonValue::Array(values)
            };
            map.insert(name.to_string(), rendered);
        }
        JsonValue::Object(map)
    }
}

/// Type label for a JSON scalar
fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(_) => "decimal",
        JsonValue::String(_) => "string",
        JsonValue::Null => "null",
        JsonValue::Array(_) | JsonValue::Object(_) => "object",
    }
}

/// System type label for a primitive value, used for synthesized value children
pub(crate) fn system_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Bool(_) => "System.Boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "System.Integer",
        JsonValue::Number(_) => "System.Decimal",
        _ => "System.String",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_resource() {
        let node = ElementNode::from_json(&json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true,
            "name": [{"family": "Doe"}, {"family": "Roe"}]
        }));

        assert_eq!(node.name(), "Patient");
        assert_eq!(node.instance_type(), Some("Patient"));
        assert_eq!(node.child_str("id"), Some("p1"));
        assert_eq!(node.children_named("name").count(), 2);
        assert_eq!(
            node.child("active").and_then(|a| a.instance_type()),
            Some("boolean")
        );
    }

    #[test]
    fn test_from_json_skips_primitive_extensions() {
        let node = ElementNode::from_json(&json!({
            "resourceType": "Patient",
            "birthDate": "1970",
            "_birthDate": {"extension": []}
        }));
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn test_to_json_groups_repeats() {
        let node = ElementNode::new("coding")
            .with_child(ElementNode::primitive("system", "uri", "http://loinc.org"))
            .with_child(ElementNode::primitive("code", "code", "1234-5"));
        assert_eq!(
            node.to_json(),
            json!({"system": "http://loinc.org", "code": "1234-5"})
        );

        let concept = ElementNode::new("code")
            .with_child(node.clone())
            .with_child(node.named("coding"));
        assert!(concept.to_json()["coding"].is_array());
    }

    #[test]
    fn test_system_type_names() {
        assert_eq!(system_type_name(&json!(true)), "System.Boolean");
        assert_eq!(system_type_name(&json!(3)), "System.Integer");
        assert_eq!(system_type_name(&json!(3.5)), "System.Decimal");
        assert_eq!(system_type_name(&json!("x")), "System.String");
    }
}
