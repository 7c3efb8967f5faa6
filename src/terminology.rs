//! Terminology seam for binding rules.
//!
//! Binding rules ask a [`TerminologyService`] whether a code belongs to a
//! value set. Services are async so remote `$validate-code` calls fit. A
//! failing service is not a validation failure: the binding rule downgrades
//! it according to the configured
//! [`ServiceFailurePolicy`](crate::config::ServiceFailurePolicy).

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TerminologyError {
    #[error("Value set {url} is unknown to the terminology service")]
    ValueSetNotFound { url: String },

    #[error("Terminology service unavailable: {message}")]
    ServiceUnavailable { message: String },
}

pub type TerminologyResult<T> = Result<T, TerminologyError>;

/// Answer to a single membership question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeMembership {
    Member,
    /// Not in the value set; a server may say why
    NotMember { reason: Option<String> },
}

impl CodeMembership {
    pub fn is_member(&self) -> bool {
        matches!(self, CodeMembership::Member)
    }
}

#[async_trait]
pub trait TerminologyService: Send + Sync {
    /// Check whether `code` (optionally qualified by `system`) is in the value set
    async fn validate_code(
        &self,
        value_set_url: &str,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeMembership>;
}

/// Strength of a binding; only `required` and `extensible` are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    Required,
    Extensible,
    Preferred,
    Example,
}

impl BindingStrength {
    pub fn is_checked(&self) -> bool {
        matches!(self, BindingStrength::Required | BindingStrength::Extensible)
    }

    /// A code outside a required binding fails the element
    pub fn is_error_on_failure(&self) -> bool {
        matches!(self, BindingStrength::Required)
    }
}

impl fmt::Display for BindingStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingStrength::Required => "required",
            BindingStrength::Extensible => "extensible",
            BindingStrength::Preferred => "preferred",
            BindingStrength::Example => "example",
        })
    }
}

type MembershipKey = (String, String, Option<String>);

/// TTL cache in front of another terminology service.
///
/// Only answers are cached; service errors go straight back to the caller
/// so a transient outage is not remembered.
pub struct CachedTerminologyService {
    inner: Arc<dyn TerminologyService>,
    answers: Cache<MembershipKey, CodeMembership>,
}

impl CachedTerminologyService {
    pub fn new(inner: Arc<dyn TerminologyService>, ttl: Duration, max_capacity: u64) -> Self {
        Self {
            inner,
            answers: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    pub async fn entry_count(&self) -> u64 {
        self.answers.run_pending_tasks().await;
        self.answers.entry_count()
    }
}

#[async_trait]
impl TerminologyService for CachedTerminologyService {
    async fn validate_code(
        &self,
        value_set_url: &str,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeMembership> {
        let key = (
            value_set_url.to_string(),
            code.to_string(),
            system.map(str::to_string),
        );
        if let Some(answer) = self.answers.get(&key).await {
            return Ok(answer);
        }

        let answer = self.inner.validate_code(value_set_url, code, system).await?;
        self.answers.insert(key, answer.clone()).await;
        Ok(answer)
    }
}

/// Value sets held in memory, for tests and small fixed vocabularies
#[derive(Debug, Default)]
pub struct InMemoryTerminologyService {
    value_sets: HashMap<String, HashSet<(String, Option<String>)>>,
}

impl InMemoryTerminologyService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_code(&mut self, value_set_url: &str, code: &str, system: Option<&str>) {
        self.value_sets
            .entry(value_set_url.to_string())
            .or_default()
            .insert((code.to_string(), system.map(str::to_string)));
    }

    pub fn with_code(mut self, value_set_url: &str, code: &str, system: Option<&str>) -> Self {
        self.add_code(value_set_url, code, system);
        self
    }
}

#[async_trait]
impl TerminologyService for InMemoryTerminologyService {
    async fn validate_code(
        &self,
        value_set_url: &str,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeMembership> {
        let codes = self
            .value_sets
            .get(value_set_url)
            .ok_or_else(|| TerminologyError::ValueSetNotFound {
                url: value_set_url.to_string(),
            })?;

        // An unqualified code matches any system; a code registered without
        // a system matches any qualified lookup.
        let found = codes.iter().any(|(c, s)| {
            c == code && (system.is_none() || s.is_none() || s.as_deref() == system)
        });
        Ok(if found {
            CodeMembership::Member
        } else {
            CodeMembership::NotMember { reason: None }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GENDER_VS: &str = "http://hl7.org/fhir/ValueSet/administrative-gender";
    const GENDER_CS: &str = "http://hl7.org/fhir/administrative-gender";

    #[tokio::test]
    async fn test_in_memory_membership() {
        let service = InMemoryTerminologyService::new()
            .with_code(GENDER_VS, "male", Some(GENDER_CS))
            .with_code(GENDER_VS, "unknown", None);

        let member = |answer: TerminologyResult<CodeMembership>| answer.unwrap().is_member();
        assert!(member(service.validate_code(GENDER_VS, "male", Some(GENDER_CS)).await));
        assert!(member(service.validate_code(GENDER_VS, "male", None).await));
        assert!(!member(
            service
                .validate_code(GENDER_VS, "male", Some("http://example.org/other"))
                .await
        ));
        assert!(member(service.validate_code(GENDER_VS, "unknown", Some(GENDER_CS)).await));
        assert!(!member(service.validate_code(GENDER_VS, "female", None).await));

        assert!(matches!(
            service.validate_code("http://example.org/vs", "x", None).await,
            Err(TerminologyError::ValueSetNotFound { .. })
        ));
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TerminologyService for Counting {
        async fn validate_code(
            &self,
            _value_set_url: &str,
            code: &str,
            _system: Option<&str>,
        ) -> TerminologyResult<CodeMembership> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if code == "down" {
                return Err(TerminologyError::ServiceUnavailable {
                    message: "timeout".to_string(),
                });
            }
            Ok(CodeMembership::Member)
        }
    }

    #[tokio::test]
    async fn test_cache_remembers_answers_not_outages() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedTerminologyService::new(inner.clone(), Duration::from_secs(60), 100);

        for _ in 0..2 {
            assert!(cached.validate_code(GENDER_VS, "male", None).await.unwrap().is_member());
            assert!(cached.validate_code(GENDER_VS, "down", None).await.is_err());
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cached.entry_count().await, 1);
    }

    #[test]
    fn test_binding_strength() {
        let strength: BindingStrength = serde_json::from_str("\"extensible\"").unwrap();
        assert_eq!(strength, BindingStrength::Extensible);
        assert!(BindingStrength::Required.is_checked());
        assert!(!BindingStrength::Example.is_checked());
        assert!(!BindingStrength::Extensible.is_error_on_failure());
    }
}
