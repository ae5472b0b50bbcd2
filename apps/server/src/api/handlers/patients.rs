//! Patient record handlers
//!
//! - `GET /api/patients/search?query=&limit=`
//! - `GET /api/demographic/:id`

use crate::{state::AppState, Error, Result};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    /// Kept as text so a malformed value becomes a JSON 400 like every other error.
    pub limit: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::BadRequest(format!("Invalid limit: {}", value))),
    }
}

pub async fn search_patients(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse> {
    let limit = parse_limit(params.limit.as_deref())?;
    let query = params.query.unwrap_or_default();
    let patients = state.patient_search.search(&query, limit).await?;
    Ok(Json(patients))
}

pub async fn patient_documents(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse> {
    let documents = state.aggregator.aggregate(&patient_id).await?;
    Ok(Json(documents))
}
