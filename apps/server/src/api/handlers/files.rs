//! Patient file handlers
//!
//! - `GET /api/patient-files/:patientId` - file manifest
//! - `GET /api/file-download?filePath=` - one file
//! - `POST /api/bulk-download` - zip of selected files

use crate::{
    request_context::RequestContext, services::download::safe_file_component, state::AppState,
    Error, Result,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDownloadRequest {
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

fn attachment(filename: &str) -> HeaderValue {
    let value = format!("attachment; filename=\"{}\"", safe_file_component(filename));
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn download_response(
    body: axum::body::Body,
    content_type: &str,
    filename: &str,
    size: u64,
) -> Response {
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_DISPOSITION, attachment(filename));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    response
}

pub async fn patient_files(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let manifest = state.manifest_builder.build_manifest(&patient_id).await?;
    Ok(Json(manifest))
}

pub async fn download_file(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response> {
    let file_path = params.file_path.unwrap_or_default();
    let download = state.downloads.open_file(&file_path).await?;

    let content_type = download.content_type.clone();
    let filename = download.filename.clone();
    let size = download.size;
    Ok(download_response(
        download.into_body(),
        &content_type,
        &filename,
        size,
    ))
}

pub async fn bulk_download(
    State(state): State<AppState>,
    context: Option<Extension<RequestContext>>,
    payload: std::result::Result<Json<BulkDownloadRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected bulk download body");
        Error::BadRequest("Invalid request parameters".to_string())
    })?;

    if let Some(Extension(context)) = &context {
        tracing::info!(
            request_id = %context.request_id,
            client_request_id = context.client_request_id.as_deref().unwrap_or("-"),
            files = request.file_ids.len(),
            "Bulk download requested"
        );
    }

    let archive = state
        .downloads
        .build_archive(&request.patient_id, &request.file_ids)
        .await?;

    let filename = archive.filename.clone();
    let size = archive.size;
    Ok(download_response(
        archive.into_body()?,
        "application/zip",
        &filename,
        size,
    ))
}
