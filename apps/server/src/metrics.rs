//! Prometheus metrics for the records server
//!
//! HTTP traffic is labelled by route template, never by raw path, so patient
//! ids and file names do not end up as label values.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, register_int_gauge_vec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGaugeVec,
};

lazy_static! {
    // HTTP

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "records_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS_TOTAL");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "records_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");

    pub static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "records_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
        &["method", "path"]
    )
    .expect("Failed to register HTTP_REQUESTS_IN_FLIGHT");

    /// Declared response size; streamed downloads report their Content-Length.
    pub static ref HTTP_RESPONSE_SIZE_BYTES: HistogramVec = register_histogram_vec!(
        "records_http_response_size_bytes",
        "HTTP response size in bytes",
        &["method", "path", "status"],
        vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0, 100_000_000.0]
    )
    .expect("Failed to register HTTP_RESPONSE_SIZE_BYTES");

    // Document store

    pub static ref DB_QUERY_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "records_db_query_duration_seconds",
        "Document store query duration in seconds",
        &["query_type"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("Failed to register DB_QUERY_DURATION_SECONDS");

    pub static ref DB_QUERY_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "records_db_query_errors_total",
        "Total number of document store query errors",
        &["query_type", "error_type"]
    )
    .expect("Failed to register DB_QUERY_ERRORS_TOTAL");

    // File pipeline

    pub static ref MANIFEST_FILES: Histogram = register_histogram!(
        "records_manifest_files",
        "Number of file descriptors per patient manifest",
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]
    )
    .expect("Failed to register MANIFEST_FILES");

    pub static ref FILE_WALKS_TOTAL: IntCounter = register_int_counter!(
        "records_file_walks_total",
        "Total number of export tree walks"
    )
    .expect("Failed to register FILE_WALKS_TOTAL");

    /// Work items skipped without failing the request, by pipeline stage
    pub static ref PARTIAL_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "records_partial_failures_total",
        "Total number of skipped collections, references and files",
        &["stage"]
    )
    .expect("Failed to register PARTIAL_FAILURES_TOTAL");

    pub static ref ARCHIVE_ENTRIES: Histogram = register_histogram!(
        "records_archive_entries",
        "Number of files written per bulk download archive",
        vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]
    )
    .expect("Failed to register ARCHIVE_ENTRIES");
}

/// Stage labels for [`struct@PARTIAL_FAILURES_TOTAL`].
pub mod stage {
    pub const COLLECTION: &str = "collection";
    pub const LOCATE: &str = "locate";
    pub const RESOLVE: &str = "resolve";
    pub const ARCHIVE: &str = "archive";
}

pub fn record_partial_failure(stage: &str) {
    PARTIAL_FAILURES_TOTAL.with_label_values(&[stage]).inc();
}

/// Map a request path to its route template to keep label cardinality bounded.
pub fn sanitize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = trimmed.split('/').skip(1).collect();
    match segments.as_slice() {
        ["health"] | ["metrics"] | ["favicon.ico"] => trimmed.to_string(),
        ["api", "patients", "search"] => "/api/patients/search".to_string(),
        ["api", "demographic", _] => "/api/demographic/{id}".to_string(),
        ["api", "patient-files", _] => "/api/patient-files/{patientId}".to_string(),
        ["api", "file-download"] => "/api/file-download".to_string(),
        ["api", "bulk-download"] => "/api/bulk-download".to_string(),
        ["api", ..] => "/api/{unknown}".to_string(),
        _ => "/{unknown}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/"), "/");
        assert_eq!(sanitize_path(""), "/");
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/metrics"), "/metrics");
        assert_eq!(sanitize_path("/api/patients/search"), "/api/patients/search");
        assert_eq!(
            sanitize_path("/api/demographic/12345"),
            "/api/demographic/{id}"
        );
        assert_eq!(
            sanitize_path("/api/patient-files/12345/"),
            "/api/patient-files/{patientId}"
        );
        assert_eq!(sanitize_path("/api/file-download"), "/api/file-download");
        assert_eq!(sanitize_path("/api/bulk-download"), "/api/bulk-download");
    }

    #[test]
    fn unknown_paths_collapse_to_one_label() {
        assert_eq!(sanitize_path("/api/demographic/1/extra"), "/api/{unknown}");
        assert_eq!(sanitize_path("/wp-admin/setup.php"), "/{unknown}");
        assert_eq!(sanitize_path("/etc/passwd"), "/{unknown}");
    }

    #[test]
    fn partial_failures_are_counted_per_stage() {
        let before = PARTIAL_FAILURES_TOTAL
            .with_label_values(&[stage::LOCATE])
            .get();
        record_partial_failure(stage::LOCATE);
        assert!(
            PARTIAL_FAILURES_TOTAL
                .with_label_values(&[stage::LOCATE])
                .get()
                > before
        );
    }
}
