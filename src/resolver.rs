//! Schema sources.
//!
//! Schemas are compiled elsewhere; the engine only looks them up by canonical
//! when an instance names a profile, an extension url or a runtime type.

use crate::canonical::Canonical;
use crate::schema::ElementSchema;
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

#[async_trait]
pub trait SchemaResolver: Send + Sync {
    /// Look up a schema; `None` when the canonical is unknown
    async fn resolve(&self, canonical: &Canonical) -> Option<Arc<ElementSchema>>;
}

/// Schemas registered up front, keyed by canonical
#[derive(Debug, Default, Clone)]
pub struct InMemorySchemaResolver {
    schemas: HashMap<String, Arc<ElementSchema>>,
}

impl InMemorySchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under its full id and, if versioned, its bare uri
    pub fn add(&mut self, schema: Arc<ElementSchema>) {
        let id = schema.id().clone();
        if id.version().is_some() {
            self.schemas
                .entry(id.uri().to_string())
                .or_insert_with(|| Arc::clone(&schema));
        }
        self.schemas.insert(id.as_str().to_string(), schema);
    }

    pub fn with_schema(mut self, schema: ElementSchema) -> Self {
        self.add(Arc::new(schema));
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[async_trait]
impl SchemaResolver for InMemorySchemaResolver {
    async fn resolve(&self, canonical: &Canonical) -> Option<Arc<ElementSchema>> {
        self.schemas
            .get(canonical.as_str())
            .or_else(|| self.schemas.get(canonical.uri()))
            .cloned()
    }
}

/// Caches lookups of another resolver, misses included
pub struct CachedSchemaResolver {
    inner: Arc<dyn SchemaResolver>,
    cache: Cache<Canonical, Option<Arc<ElementSchema>>>,
}

impl CachedSchemaResolver {
    pub fn new(inner: Arc<dyn SchemaResolver>, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl SchemaResolver for CachedSchemaResolver {
    async fn resolve(&self, canonical: &Canonical) -> Option<Arc<ElementSchema>> {
        if let Some(hit) = self.cache.get(canonical).await {
            trace!(%canonical, "schema cache hit");
            return hit;
        }
        let resolved = self.inner.resolve(canonical).await;
        self.cache.insert(canonical.clone(), resolved.clone()).await;
        resolved
    }
}
