//! Business logic layer
//!
//! Services receive their collaborators at construction and are shared
//! through `AppState`.

pub mod aggregate;
pub mod download;
pub mod manifest;
pub mod patients;

pub use aggregate::{PatientDocumentAggregator, PatientDocuments};
pub use download::{BulkArchive, DownloadService, FileDownload};
pub use manifest::FileManifestBuilder;
pub use patients::PatientSearchService;
