//! Document store abstraction
//!
//! Patient data lives in a schema-less document database: named collections
//! of nested JSON documents, discovered at runtime. Callers only need to
//! enumerate collections and filter documents by a field path, so that is all
//! the trait exposes.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

/// Collection holding one demographic record per patient.
pub const DEMOGRAPHIC_COLLECTION: &str = "demographic";

/// Field carrying the patient identifier in every collection.
pub const PATIENT_ID_FIELD: &str = "patientdetails.athenapatientid";

/// Dotted path into a nested document, e.g. `patientdetails.athenapatientid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Value at this path in `document`, if every segment is present.
    pub fn lookup<'a>(&self, document: &'a JsonValue) -> Option<&'a JsonValue> {
        self.0
            .iter()
            .try_fold(document, |node, segment| node.as_object()?.get(segment))
    }

    /// Scalar at this path rendered as text, the way the database renders it
    /// for comparison. Objects, arrays and null have no text form.
    pub fn text<'a>(&self, document: &'a JsonValue) -> Option<std::borrow::Cow<'a, str>> {
        match self.lookup(document)? {
            JsonValue::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
            JsonValue::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
            JsonValue::Bool(b) => Some(std::borrow::Cow::Owned(b.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Predicate over a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Field text equals `value` exactly.
    Equals { path: FieldPath, value: String },
    /// Field text contains `needle`, ignoring case. `needle` is literal.
    ContainsIgnoreCase { path: FieldPath, needle: String },
    /// At least one of the filters matches. An empty list matches nothing.
    Any(Vec<DocumentFilter>),
}

impl DocumentFilter {
    pub fn equals(path: &str, value: impl Into<String>) -> Self {
        Self::Equals {
            path: FieldPath::parse(path),
            value: value.into(),
        }
    }

    pub fn contains_ignore_case(path: &str, needle: impl Into<String>) -> Self {
        Self::ContainsIgnoreCase {
            path: FieldPath::parse(path),
            needle: needle.into(),
        }
    }

    /// Documents belonging to one patient.
    pub fn patient(patient_id: &str) -> Self {
        Self::equals(PATIENT_ID_FIELD, patient_id)
    }

    /// Evaluate the filter in memory.
    pub fn matches(&self, document: &JsonValue) -> bool {
        match self {
            Self::Equals { path, value } => path
                .text(document)
                .is_some_and(|text| text == value.as_str()),
            Self::ContainsIgnoreCase { path, needle } => path.text(document).is_some_and(|text| {
                text.to_lowercase().contains(&needle.to_lowercase())
            }),
            Self::Any(filters) => filters.iter().any(|f| f.matches(document)),
        }
    }
}

/// Read access to a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of every collection currently in the store, sorted ascending.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Documents of `collection` matching `filter`, in store order.
    ///
    /// An unknown collection yields an empty result.
    async fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        limit: Option<usize>,
    ) -> Result<Vec<JsonValue>>;
}
