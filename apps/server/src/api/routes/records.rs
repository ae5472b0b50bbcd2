//! Patient records API routes, nested under `/api`

use crate::api::handlers::{files, patients};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn records_routes() -> Router<AppState> {
    Router::new()
        .route("/patients/search", get(patients::search_patients))
        .route("/demographic/:id", get(patients::patient_documents))
        .route("/patient-files/:patient_id", get(files::patient_files))
        .route("/file-download", get(files::download_file))
        .route("/bulk-download", post(files::bulk_download))
}
