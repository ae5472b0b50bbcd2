//! In-memory document store for tests and local tooling.

use super::traits::{DocumentFilter, DocumentStore};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, Vec<JsonValue>>,
    failing: HashSet<String>,
    unavailable: bool,
    listing_delay: Option<Duration>,
    collection_delays: HashMap<String, Duration>,
}

/// Collections kept in a sorted map; documents keep insertion order.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, document: JsonValue) {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .collections
                .entry(collection.to_string())
                .or_default()
                .push(document);
        }
    }

    /// Make every query against `collection` fail with a database error.
    pub fn fail_collection(&self, collection: &str) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failing.insert(collection.to_string());
        }
    }

    /// Simulate a lost database connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut inner) = self.inner.write() {
            inner.unavailable = unavailable;
        }
    }

    /// Make `list_collections` wait `delay` before answering.
    pub fn delay_listing(&self, delay: Duration) {
        if let Ok(mut inner) = self.inner.write() {
            inner.listing_delay = Some(delay);
        }
    }

    /// Make every query against `collection` wait `delay` before answering.
    pub fn delay_collection(&self, collection: &str, delay: Duration) {
        if let Ok(mut inner) = self.inner.write() {
            inner
                .collection_delays
                .insert(collection.to_string(), delay);
        }
    }

    fn delay_for(&self, collection: Option<&str>) -> Option<Duration> {
        let inner = self.inner.read().ok()?;
        match collection {
            Some(name) => inner.collection_delays.get(name).copied(),
            None => inner.listing_delay,
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::Internal("document store lock poisoned".to_string()))?;
        if inner.unavailable {
            return Err(Error::Unavailable("database connection lost".to_string()));
        }
        Ok(inner)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        if let Some(delay) = self.delay_for(None) {
            tokio::time::sleep(delay).await;
        }
        Ok(self.read()?.collections.keys().cloned().collect())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<JsonValue>> {
        if let Some(delay) = self.delay_for(Some(collection)) {
            tokio::time::sleep(delay).await;
        }
        let inner = self.read()?;
        if inner.failing.contains(collection) {
            return Err(Error::Database(sqlx::Error::Protocol(format!(
                "query against {} failed",
                collection
            ))));
        }

        let documents = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .take(limit.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(documents)
    }
}
