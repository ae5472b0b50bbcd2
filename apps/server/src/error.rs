//! Error types for the records server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use records_files::FilesError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Database(_)
            | Error::Io(_)
            | Error::Archive(_)
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures of the connection rather than of a single query.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Error::Unavailable(err.to_string())
            }
            sqlx::Error::Io(e) => Error::Unavailable(e.to_string()),
            sqlx::Error::Tls(e) => Error::Unavailable(e.to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<FilesError> for Error {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound(what) => {
                tracing::debug!(file = %what, "File not found");
                Error::NotFound("File not found".to_string())
            }
            // The resolved path is logged, never echoed to the client.
            FilesError::Forbidden(path) => {
                tracing::warn!(path = %path.display(), "Rejected path outside export root");
                Error::Forbidden("Access to the file is forbidden".to_string())
            }
            FilesError::InvalidInput(msg) => Error::BadRequest(msg),
            FilesError::Timeout(what) => Error::Timeout(what),
            FilesError::Io(e) => Error::Io(e),
            FilesError::Archive(e) => Error::Archive(e.to_string()),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "Internal server error".to_string()
        } else {
            if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), "{}", self);
            }
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
