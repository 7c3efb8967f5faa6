//! Canonical schema identities.
//!
//! A canonical has the shape `uri[|version][#anchor]`. The anchor addresses a
//! sub-schema inside the schema named by the uri (see
//! [`ElementSchema::find_by_anchor`](crate::schema::ElementSchema::find_by_anchor)).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical URL of a FHIR structure definition
pub const FHIR_STRUCTURE_DEFINITION_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Canonical(String);

impl Canonical {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Canonical for a core FHIR type name, e.g. `Patient`
    pub fn for_fhir_type(type_name: &str) -> Self {
        Self(format!("{FHIR_STRUCTURE_DEFINITION_BASE}{type_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The uri part, without version or anchor
    pub fn uri(&self) -> &str {
        let end = self
            .0
            .find(['|', '#'])
            .unwrap_or(self.0.len());
        &self.0[..end]
    }

    pub fn version(&self) -> Option<&str> {
        let start = self.0.find('|')? + 1;
        let rest = &self.0[start..];
        let end = rest.find('#').unwrap_or(rest.len());
        Some(&rest[..end]).filter(|v| !v.is_empty())
    }

    pub fn anchor(&self) -> Option<&str> {
        let start = self.0.find('#')? + 1;
        Some(&self.0[start..]).filter(|a| !a.is_empty())
    }

    /// This canonical with the anchor removed
    pub fn without_anchor(&self) -> Canonical {
        match self.0.find('#') {
            Some(idx) => Canonical(self.0[..idx].to_string()),
            None => self.clone(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        url::Url::parse(self.uri()).is_ok()
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Canonical {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Canonical {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for Canonical {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Canonical {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Canonical)
    }
}
