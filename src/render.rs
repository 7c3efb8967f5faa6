//! Diagnostic JSON rendering of schemas and rules.
//!
//! The output is meant for humans inspecting a compiled schema graph; it is
//! not a serialization format and cannot be read back.

use crate::assertion::Assertion;
use crate::schema::ElementSchema;
use serde_json::{Map, Value as JsonValue, json};

/// Render a schema as a JSON object: its id followed by one entry per member
pub fn render_schema(schema: &ElementSchema) -> JsonValue {
    let mut object = Map::new();
    object.insert("id".to_string(), JsonValue::String(schema.id().to_string()));
    if let Some(structure) = schema.structure() {
        object.insert(
            "type".to_string(),
            JsonValue::String(structure.data_type.clone()),
        );
        if !structure.base_canonicals.is_empty() {
            let bases: Vec<String> = structure
                .base_canonicals
                .iter()
                .map(ToString::to_string)
                .collect();
            object.insert("base".to_string(), json!(bases));
        }
    }
    insert_members(&mut object, schema.members());
    JsonValue::Object(object)
}

/// Render members into `object`, suffixing repeated keys with their ordinal
fn insert_members(object: &mut Map<String, JsonValue>, members: &[Assertion]) {
    for member in members {
        let (key, value) = render_assertion(member);
        object.insert(unique_key(object, key), value);
    }
}

fn unique_key(object: &Map<String, JsonValue>, key: String) -> String {
    if !object.contains_key(&key) {
        return key;
    }
    let mut ordinal = 2;
    loop {
        let candidate = format!("{key}{ordinal}");
        if !object.contains_key(&candidate) {
            return candidate;
        }
        ordinal += 1;
    }
}

fn render_members(members: &[Assertion]) -> JsonValue {
    let mut object = Map::new();
    insert_members(&mut object, members);
    JsonValue::Object(object)
}

/// Render one rule as a `(key, json)` pair
pub fn render_assertion(assertion: &Assertion) -> (String, JsonValue) {
    let key = assertion.name().to_string();
    let value = match assertion {
        Assertion::Result(v) => json!(v.outcome()),
        Assertion::Issue(v) => json!({
            "code": v.code().to_string(),
            "severity": v.severity(),
            "message": v.message(),
        }),
        Assertion::Trace(v) => json!(v.message()),
        Assertion::Definitions(v) => JsonValue::Array(
            v.schemas()
                .iter()
                .map(|schema| render_schema(schema))
                .collect(),
        ),
        Assertion::Cardinality(v) => json!(v.render()),
        Assertion::Fixed(v) => v.value().clone(),
        Assertion::Pattern(v) => v.pattern().clone(),
        Assertion::Regex(v) => json!(v.pattern()),
        Assertion::MinMaxValue(v) => v.limit().clone(),
        Assertion::MaxLength(v) => json!(v.max()),
        Assertion::TypeLabel(v) => json!(v.label()),
        Assertion::Invariant(v) => json!({
            "key": v.key(),
            "expression": v.expression(),
            "bestPractice": v.is_best_practice(),
        }),
        Assertion::Binding(v) => json!({
            "valueSet": v.value_set().to_string(),
            "strength": v.strength().to_string(),
        }),
        Assertion::All(v) => {
            let mut object = Map::new();
            if v.is_short_circuit() {
                object.insert("shortcircuitEvaluation".to_string(), json!(true));
            }
            object.insert("members".to_string(), render_members(v.members()));
            JsonValue::Object(object)
        }
        Assertion::Any(v) => {
            let mut object = Map::new();
            if let Some(summary) = v.summary() {
                object.insert("summary".to_string(), json!(summary.message()));
            }
            object.insert("members".to_string(), render_members(v.members()));
            JsonValue::Object(object)
        }
        Assertion::Children(v) => {
            let mut object = Map::new();
            for (name, child) in v.children() {
                let rendered = match child {
                    Assertion::Schema(schema) => render_schema(schema),
                    other => render_members(std::slice::from_ref(other)),
                };
                object.insert(unique_key(&object, name.clone()), rendered);
            }
            if v.allows_additional() {
                object.insert("allowAdditionalChildren".to_string(), json!(true));
            }
            JsonValue::Object(object)
        }
        Assertion::Slice(v) => {
            let mut slices = Map::new();
            for slice in v.slices() {
                let mut rendered = Map::new();
                rendered.insert("condition".to_string(), render_members(std::slice::from_ref(&slice.condition)));
                rendered.insert("assertion".to_string(), render_members(std::slice::from_ref(&slice.assertion)));
                slices.insert(unique_key(&slices, slice.name.clone()), JsonValue::Object(rendered));
            }
            json!({
                "ordered": v.is_ordered(),
                "defaultAtEnd": v.is_default_at_end(),
                "case": slices,
                "default": render_members(std::slice::from_ref(v.default_assertion())),
            })
        }
        Assertion::Schema(schema) => render_schema(schema),
        Assertion::SchemaReference(v) => json!(v.canonical().to_string()),
        Assertion::DynamicSchemaReference(v) => json!(v.declared().to_string()),
        Assertion::Reference(v) => {
            let mut object = Map::new();
            object.insert("schema".to_string(), render_members(std::slice::from_ref(v.schema())));
            if let Some(rules) = v.aggregation_rules() {
                let rules: Vec<String> = rules.iter().map(ToString::to_string).collect();
                object.insert("aggregation".to_string(), json!(rules));
            }
            if let Some(rule) = v.versioning_rule() {
                object.insert("versioning".to_string(), json!(rule.to_string()));
            }
            JsonValue::Object(object)
        }
        Assertion::External(ext) => ext.to_json(),
    };
    (key, value)
}
