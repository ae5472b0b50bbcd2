//! Request handlers for API endpoints
//!
//! Handlers only extract parameters, call a service from `AppState` and
//! shape the response. Errors convert into JSON bodies through `Error`.

pub mod files;
pub mod metrics;
pub mod patients;

pub use files::{bulk_download, download_file, patient_files};
pub use metrics::metrics_handler;
pub use patients::{patient_documents, search_patients};
