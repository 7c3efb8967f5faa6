use octofhir_validator::validators::{
    ChildrenValidator, IssueAssertion, ReferencedInstanceValidator,
};
use octofhir_validator::*;
use std::sync::Arc;

/// Route engine logs to the test harness, filtered by `RUST_LOG`
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const FHIR_BASE: &str = "http://hl7.org/fhir/StructureDefinition";

#[allow(dead_code)]
pub fn fhir_canonical(type_name: &str) -> String {
    format!("{FHIR_BASE}/{type_name}")
}

/// Rule that fails with an error issue carrying `tag`
#[allow(dead_code)]
pub fn failing(tag: &str) -> Assertion {
    Assertion::Issue(IssueAssertion::new(IssueCode::Custom(9001), tag))
}

/// Rule that succeeds with an informational issue carrying `tag`
#[allow(dead_code)]
pub fn succeeding(tag: &str) -> Assertion {
    Assertion::Issue(
        IssueAssertion::new(IssueCode::Custom(9000), tag).with_severity(Severity::Information),
    )
}

/// Messages of every issue in the report, nested reports included
#[allow(dead_code)]
pub fn messages(report: &ResultReport) -> Vec<String> {
    report.issues().iter().map(|i| i.message.clone()).collect()
}

#[allow(dead_code)]
pub fn node(name: &str) -> Arc<ElementNode> {
    ElementNode::new(name).into_shared()
}

#[allow(dead_code)]
pub fn state() -> ValidationState {
    ValidationState::new("Test")
}

/// Follows a reference and validates the target against its runtime type
#[allow(dead_code)]
pub fn reference_rule() -> ReferencedInstanceValidator {
    ReferencedInstanceValidator::new(Assertion::DynamicSchemaReference(
        validators::DynamicSchemaReferenceValidator::new(fhir_canonical("Resource")),
    ))
}

/// Wrap a single-node rule so it applies to every repetition
#[allow(dead_code)]
pub fn repeating(id: &str, rule: Assertion) -> Assertion {
    ElementSchema::new(id, vec![rule]).into()
}

/// Resource schema deriving from DomainResource, with open children
#[allow(dead_code)]
pub fn resource_schema(type_name: &str, children: Vec<(&str, Assertion)>) -> ElementSchema {
    ElementSchema::resource(
        StructureDefinitionInfo::new(fhir_canonical(type_name), type_name)
            .with_bases([fhir_canonical("DomainResource"), fhir_canonical("Resource")]),
        vec![Assertion::Children(ChildrenValidator::new(children, true))],
    )
}

/// Patient and Organization schemas whose reference elements are followed
#[allow(dead_code)]
pub fn reference_schemas() -> InMemorySchemaResolver {
    let patient = resource_schema(
        "Patient",
        vec![
            ("managingOrganization", Assertion::Reference(reference_rule())),
            (
                "generalPractitioner",
                repeating("#Patient.generalPractitioner", Assertion::Reference(reference_rule())),
            ),
            ("link", repeating("#Patient.link", Assertion::Reference(reference_rule()))),
        ],
    );
    let organization = resource_schema(
        "Organization",
        vec![("partOf", Assertion::Reference(reference_rule()))],
    );
    let bundle = resource_schema(
        "Bundle",
        vec![(
            "entry",
            repeating(
                "#Bundle.entry",
                Assertion::Children(ChildrenValidator::new(
                    [(
                        "resource",
                        Assertion::DynamicSchemaReference(
                            validators::DynamicSchemaReferenceValidator::new(fhir_canonical(
                                "Resource",
                            )),
                        ),
                    )],
                    true,
                )),
            ),
        )],
    );
    InMemorySchemaResolver::new()
        .with_schema(patient)
        .with_schema(organization)
        .with_schema(bundle)
}

#[allow(dead_code)]
pub fn reference_context() -> ValidationContext {
    ValidationContext::new().with_schema_resolver(Arc::new(reference_schemas()))
}

#[allow(dead_code)]
pub async fn schema_for(context: &ValidationContext, type_name: &str) -> Arc<ElementSchema> {
    context
        .resolve_schema(&Canonical::new(fhir_canonical(type_name)))
        .await
        .unwrap()
        .unwrap()
}
