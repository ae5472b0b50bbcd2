//! Cross-collection patient document aggregation
//!
//! The set of collections is not known up front, so every collection is
//! asked for documents carrying the patient id. A collection that fails is
//! skipped; losing the database connection fails the request.

use crate::db::{DocumentFilter, DocumentStore};
use crate::metrics::{record_partial_failure, stage};
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Collection name to the patient's documents in it, sorted by collection.
pub type PatientDocuments = BTreeMap<String, Vec<JsonValue>>;

pub struct PatientDocumentAggregator {
    store: Arc<dyn DocumentStore>,
    concurrency: usize,
    query_timeout: Option<Duration>,
}

impl PatientDocumentAggregator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        concurrency: usize,
        query_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            query_timeout,
        }
    }

    /// Every document of `patient_id`, grouped by collection.
    ///
    /// Collections without a match are omitted.
    ///
    /// # Errors
    /// * `BadRequest` - empty patient id
    /// * `NotFound` - no collection holds a document for the patient
    /// * `Unavailable` - the store cannot be reached
    #[tracing::instrument(name = "aggregate_patient", skip(self))]
    pub async fn aggregate(&self, patient_id: &str) -> Result<PatientDocuments> {
        if patient_id.trim().is_empty() {
            return Err(Error::BadRequest("Patient id is required".to_string()));
        }

        let collections = self.list_collections().await?;
        let filter = DocumentFilter::patient(patient_id);

        let results: Vec<(String, Result<Vec<JsonValue>>)> = stream::iter(collections)
            .map(|collection| {
                let filter = &filter;
                async move {
                    let result = self.query(&collection, filter).await;
                    (collection, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut documents = PatientDocuments::new();
        for (collection, result) in results {
            match result {
                Ok(found) if found.is_empty() => {}
                Ok(found) => {
                    tracing::debug!(collection = %collection, count = found.len(), "Collection matched");
                    documents.insert(collection, found);
                }
                Err(e) if e.is_unavailable() => return Err(e),
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Skipping collection");
                    record_partial_failure(stage::COLLECTION);
                }
            }
        }

        if documents.is_empty() {
            return Err(Error::NotFound(
                "Patient data not found in any collection".to_string(),
            ));
        }

        Ok(documents)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let listing = self.store.list_collections();
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, listing).await.map_err(|_| {
                Error::Unavailable("timed out listing collections".to_string())
            })?,
            None => listing.await,
        }
    }

    async fn query(&self, collection: &str, filter: &DocumentFilter) -> Result<Vec<JsonValue>> {
        let find = self.store.find(collection, filter, None);
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, find)
                .await
                .map_err(|_| Error::Timeout(format!("query against {}", collection)))?,
            None => find.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDocumentStore;
    use serde_json::json;

    fn patient(id: &str) -> JsonValue {
        json!({"patientdetails": {"athenapatientid": id}})
    }

    fn aggregator(store: &InMemoryDocumentStore) -> PatientDocumentAggregator {
        PatientDocumentAggregator::new(Arc::new(store.clone()), 4, None)
    }

    #[tokio::test]
    async fn groups_matching_documents_by_collection() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        store.insert("notes", patient("12345"));
        store.insert("notes", patient("12345"));
        store.insert("notes", patient("999"));
        store.insert("labs", patient("999"));

        let documents = aggregator(&store).aggregate("12345").await.unwrap();
        assert_eq!(
            documents.keys().collect::<Vec<_>>(),
            vec!["demographic", "notes"]
        );
        assert_eq!(documents["notes"].len(), 2);
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        assert!(matches!(
            aggregator(&store).aggregate("nonexistent").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_patient_id_is_rejected() {
        let store = InMemoryDocumentStore::new();
        assert!(matches!(
            aggregator(&store).aggregate("  ").await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn failing_collection_is_skipped() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        store.insert("notes", patient("12345"));
        store.fail_collection("notes");

        let documents = aggregator(&store).aggregate("12345").await.unwrap();
        assert_eq!(documents.keys().collect::<Vec<_>>(), vec!["demographic"]);
    }

    #[tokio::test]
    async fn slow_collection_is_skipped_after_query_timeout() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        store.insert("notes", patient("12345"));
        store.delay_collection("notes", Duration::from_secs(30));

        let aggregator = PatientDocumentAggregator::new(
            Arc::new(store.clone()),
            4,
            Some(Duration::from_millis(100)),
        );
        let documents = aggregator.aggregate("12345").await.unwrap();
        assert_eq!(documents.keys().collect::<Vec<_>>(), vec!["demographic"]);
    }

    #[tokio::test]
    async fn slow_collection_listing_is_unavailable() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        store.delay_listing(Duration::from_secs(30));

        let aggregator = PatientDocumentAggregator::new(
            Arc::new(store.clone()),
            4,
            Some(Duration::from_millis(100)),
        );
        let err = aggregator.aggregate("12345").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn unavailable_store_aborts() {
        let store = InMemoryDocumentStore::new();
        store.insert("demographic", patient("12345"));
        store.set_unavailable(true);
        assert!(aggregator(&store)
            .aggregate("12345")
            .await
            .unwrap_err()
            .is_unavailable());
    }
}
