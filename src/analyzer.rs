//! Reasoning over families of related schemas.
//!
//! When an instance names extra schemas (declared profiles, extension urls,
//! runtime types) those are fetched, checked against the schema the
//! instance was already headed for, and reduced to the most-derived members
//! so no lineage is validated twice.

use crate::canonical::Canonical;
use crate::context::ValidationContext;
use crate::error::Result;
use crate::issue::IssueCode;
use crate::report::ResultReport;
use crate::schema::ElementSchema;
use crate::state::ValidationState;
use crate::validators::IssueAssertion;
use std::sync::Arc;
use tracing::{debug, warn};

/// Schemas found by [`fetch_schemas`], plus a report per canonical that was not
#[derive(Debug, Default)]
pub struct FetchResult {
    pub schemas: Vec<Arc<ElementSchema>>,
    pub errors: Vec<ResultReport>,
}

/// Resolve canonicals through the context's schema resolver.
///
/// Unknown canonicals become warnings. A missing resolver is an error.
pub async fn fetch_schemas(
    context: &ValidationContext,
    state: &ValidationState,
    canonicals: &[Canonical],
) -> Result<FetchResult> {
    let mut result = FetchResult::default();
    for canonical in canonicals {
        match context.resolve_schema(canonical).await? {
            Some(schema) => {
                debug!(%canonical, "fetched schema");
                result.schemas.push(schema);
            }
            None => {
                warn!(%canonical, "schema could not be resolved");
                result.errors.push(
                    IssueAssertion::new(
                        IssueCode::UnresolvableSchema,
                        format!("Unable to resolve reference to profile '{canonical}'"),
                    )
                    .as_result(state),
                );
            }
        }
    }
    Ok(result)
}

/// Keep only the most-derived schema of every lineage.
///
/// A schema is dropped when another member lists it among its bases;
/// duplicates collapse to their first occurrence. Order is preserved.
pub fn calculate_minimal_set<'a>(schemas: &[&'a ElementSchema]) -> Vec<&'a ElementSchema> {
    if schemas.len() <= 1 {
        return schemas.to_vec();
    }

    let mut minimal: Vec<&'a ElementSchema> = Vec::with_capacity(schemas.len());
    for &candidate in schemas {
        if minimal.iter().any(|kept| kept.id() == candidate.id()) {
            continue;
        }
        let superseded = schemas.iter().any(|other| {
            other.id() != candidate.id()
                && other
                    .base_canonicals()
                    .iter()
                    .any(|base| base.uri() == candidate.id().uri())
        });
        if !superseded {
            minimal.push(candidate);
        }
    }
    minimal
}

/// Check that declared types and profiles describe compatible things.
///
/// The declared schema and canonical must be related. Every profile must be
/// related to the base (the declared schema, else the declared canonical),
/// and the profiles that are must also be related to each other. Two schemas
/// are related when one derives from the other or both constrain the same
/// data type. Whatever is absent is not checked.
pub fn validate_consistency(
    declared_type: Option<&ElementSchema>,
    declared_canonical: Option<&Canonical>,
    profiles: &[Arc<ElementSchema>],
    state: &ValidationState,
) -> ResultReport {
    let mut reports = Vec::new();

    if let (Some(schema), Some(canonical)) = (declared_type, declared_canonical)
        && !related_to_canonical(schema, canonical)
    {
        reports.push(
            IssueAssertion::new(
                IssueCode::IncompatibleDeclaredType,
                format!(
                    "The declared type of the element ({canonical}) is incompatible with that of the instance ({})",
                    schema.id()
                ),
            )
            .as_result(state),
        );
    }

    let mut accepted: Vec<&ElementSchema> = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let (compatible, base) = match (declared_type, declared_canonical) {
            (Some(schema), _) => (related(profile, schema), schema.id()),
            (None, Some(canonical)) => (related_to_canonical(profile, canonical), canonical),
            (None, None) => {
                accepted.push(profile.as_ref());
                continue;
            }
        };
        if compatible {
            accepted.push(profile.as_ref());
        } else {
            reports.push(incompatible_profiles(
                format!(
                    "Profile '{}' is incompatible with the instance type '{base}'",
                    profile.id()
                ),
                state,
            ));
        }
    }

    for (index, first) in accepted.iter().enumerate() {
        for second in &accepted[index + 1..] {
            if !related(first, second) {
                reports.push(incompatible_profiles(
                    format!(
                        "Profiles '{}' and '{}' are incompatible with each other",
                        first.id(),
                        second.id()
                    ),
                    state,
                ));
            }
        }
    }

    ResultReport::combine(reports)
}

fn incompatible_profiles(message: String, state: &ValidationState) -> ResultReport {
    IssueAssertion::new(IssueCode::IncompatibleProfiles, message).as_result(state)
}

fn data_type(schema: &ElementSchema) -> Option<&str> {
    schema.structure().map(|s| s.data_type.as_str())
}

fn related(a: &ElementSchema, b: &ElementSchema) -> bool {
    if a.is_derived_from(b.id()) || b.is_derived_from(a.id()) {
        return true;
    }
    matches!((data_type(a), data_type(b)), (Some(x), Some(y)) if x == y)
}

/// Only the schema side of the pair is known, so the canonical is either
/// among its ancestors or names the data type it constrains
fn related_to_canonical(schema: &ElementSchema, canonical: &Canonical) -> bool {
    schema.is_derived_from(canonical)
        || data_type(schema)
            .is_some_and(|t| Canonical::for_fhir_type(t).uri() == canonical.uri())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StructureDefinitionInfo;

    fn schema(id: &str, bases: &[&str]) -> ElementSchema {
        ElementSchema::resource(
            StructureDefinitionInfo::new(id, id.trim_start_matches("urn:"))
                .with_bases(bases.iter().copied()),
            Vec::new(),
        )
    }

    #[test]
    fn test_minimal_set_keeps_most_derived() {
        let a = schema("urn:a", &[]);
        let aa = schema("urn:aa", &["urn:a"]);
        let aaa = schema("urn:aaa", &["urn:aa", "urn:a"]);
        let b = schema("urn:b", &[]);

        let minimal = calculate_minimal_set(&[&a, &aaa, &aa, &b, &aaa]);
        let ids: Vec<&str> = minimal.iter().map(|s| s.id().as_str()).collect();
        assert_eq!(ids, vec!["urn:aaa", "urn:b"]);
    }

    #[test]
    fn test_minimal_set_single() {
        let a = schema("urn:a", &[]);
        assert_eq!(calculate_minimal_set(&[&a]).len(), 1);
    }

    #[test]
    fn test_consistency() {
        let state = ValidationState::new("Patient");
        let patient = schema("urn:Patient", &["urn:DomainResource"]);
        let profile = Arc::new(schema("urn:my-patient", &["urn:Patient", "urn:DomainResource"]));
        let observation = Arc::new(schema("urn:Observation", &["urn:DomainResource"]));

        let ok = validate_consistency(Some(&patient), None, &[Arc::clone(&profile)], &state);
        assert!(ok.is_plain_success());

        let bad = validate_consistency(Some(&patient), None, &[observation], &state);
        assert!(bad.is_failure());
        assert!(bad.issues()[0].message.contains("incompatible"));

        let declared = Canonical::new("urn:Observation");
        let bad = validate_consistency(Some(&patient), Some(&declared), &[], &state);
        assert!(bad.has_issue(IssueCode::IncompatibleDeclaredType));

        assert!(validate_consistency(None, None, &[profile], &state).is_plain_success());
    }
}
