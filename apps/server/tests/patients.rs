mod support;

use axum::http::{Method, StatusCode};
use support::*;

#[tokio::test]
async fn search_matches_first_name_case_insensitively() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search?query=ada", None)
                .await?;
            assert_status(status, StatusCode::OK, "search by first name");

            let patients = json_body(&body)?;
            let patients = patients.as_array().cloned().unwrap_or_default();
            assert_eq!(patients.len(), 1);
            assert_eq!(patients[0]["patientdetails"]["athenapatientid"], PATIENT_ID);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn search_matches_exact_patient_id() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search?query=777", None)
                .await?;
            assert_status(status, StatusCode::OK, "search by id");

            let patients = json_body(&body)?;
            assert_eq!(patients[0]["patientdetails"]["lastname"], "Hopper");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn search_limit_caps_results() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            // "o" appears in both Lovelace and Hopper
            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search?query=o&limit=1", None)
                .await?;
            assert_status(status, StatusCode::OK, "limited search");
            assert_eq!(json_body(&body)?.as_array().map(Vec::len), Some(1));

            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search?query=o", None)
                .await?;
            assert_status(status, StatusCode::OK, "unlimited search");
            assert_eq!(json_body(&body)?.as_array().map(Vec::len), Some(2));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn search_rejects_missing_query_and_bad_limit() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "missing query");
            assert_error_message(&body, "Search query is required")?;

            let (status, _headers, _body) = app
                .request(Method::GET, "/api/patients/search?query=ada&limit=ten", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "non-numeric limit");

            let (status, _headers, _body) = app
                .request(Method::GET, "/api/patients/search?query=ada&limit=0", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "zero limit");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn search_without_matches_is_not_found() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/patients/search?query=nobody", None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "no matches");
            assert_error_message(&body, "No patients found")?;
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn demographic_groups_documents_by_collection() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, body) = app
                .request(Method::GET, &format!("/api/demographic/{PATIENT_ID}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "patient documents");
            assert!(headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("application/json")));

            let documents = json_body(&body)?;
            let collections = documents.as_object().cloned().unwrap_or_default();
            let names: Vec<&str> = collections.keys().map(String::as_str).collect();
            assert_eq!(names, vec!["demographic", "notes"]);
            assert_eq!(collections["demographic"].as_array().map(Vec::len), Some(1));
            assert_eq!(
                collections["demographic"][0]["patientdetails"]["firstname"],
                "Ada"
            );
            assert_eq!(collections["notes"].as_array().map(Vec::len), Some(1));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn demographic_skips_failing_collection() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.store.fail_collection("notes");

            let (status, _headers, body) = app
                .request(Method::GET, &format!("/api/demographic/{PATIENT_ID}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "partial result");

            let documents = json_body(&body)?;
            assert!(documents.get("demographic").is_some());
            assert!(documents.get("notes").is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn demographic_unknown_patient_is_not_found() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, body) = app
                .request(Method::GET, "/api/demographic/does-not-exist", None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown patient");
            assert_error_message(&body, "Patient data not found in any collection")?;
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn unavailable_store_is_service_unavailable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            app.store.set_unavailable(true);

            let (status, _headers, _body) = app
                .request(Method::GET, &format!("/api/demographic/{PATIENT_ID}"), None)
                .await?;
            assert_status(status, StatusCode::SERVICE_UNAVAILABLE, "store down");
            Ok(())
        })
    })
    .await
}
