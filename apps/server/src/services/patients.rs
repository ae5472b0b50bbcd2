//! Patient search over the demographic collection

use crate::db::{DocumentFilter, DocumentStore, DEMOGRAPHIC_COLLECTION, PATIENT_ID_FIELD};
use crate::{Error, Result};
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub struct PatientSearchService {
    store: Arc<dyn DocumentStore>,
    default_limit: usize,
    max_limit: usize,
}

impl PatientSearchService {
    pub fn new(store: Arc<dyn DocumentStore>, default_limit: usize, max_limit: usize) -> Self {
        Self {
            store,
            default_limit,
            max_limit,
        }
    }

    /// Demographic records whose first or last name contains `query`
    /// (case-insensitive, literal) or whose patient id equals it.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<JsonValue>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::BadRequest("Search query is required".to_string()));
        }
        let limit = self.effective_limit(limit)?;

        let filter = DocumentFilter::Any(vec![
            DocumentFilter::contains_ignore_case("patientdetails.firstname", query),
            DocumentFilter::contains_ignore_case("patientdetails.lastname", query),
            DocumentFilter::equals(PATIENT_ID_FIELD, query),
        ]);

        let patients = self
            .store
            .find(DEMOGRAPHIC_COLLECTION, &filter, Some(limit))
            .await?;

        if patients.is_empty() {
            return Err(Error::NotFound("No patients found".to_string()));
        }

        tracing::debug!(matches = patients.len(), limit, "Patient search completed");
        Ok(patients)
    }

    fn effective_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_limit),
            Some(0) => Err(Error::BadRequest("limit must be greater than 0".to_string())),
            Some(n) => Ok(n.min(self.max_limit)),
        }
    }
}
