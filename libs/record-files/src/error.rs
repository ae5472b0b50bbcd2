//! Error types for file location, resolution and archiving

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilesError>;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Path escapes export root: {}", .0.display())]
    Forbidden(PathBuf),

    #[error("Invalid file id: {0}")]
    InvalidInput(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl FilesError {
    /// Short, stable label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FilesError::NotFound(_) => "not_found",
            FilesError::Forbidden(_) => "forbidden",
            FilesError::InvalidInput(_) => "invalid_input",
            FilesError::Timeout(_) => "timeout",
            FilesError::Io(_) => "io",
            FilesError::Archive(_) => "archive",
        }
    }
}
