//! Database layer - document stores and data access

pub mod memory;
pub mod store;
pub mod traits;

pub use memory::InMemoryDocumentStore;
pub use store::PostgresDocumentStore;
pub use traits::{
    DocumentFilter, DocumentStore, FieldPath, DEMOGRAPHIC_COLLECTION, PATIENT_ID_FIELD,
};
