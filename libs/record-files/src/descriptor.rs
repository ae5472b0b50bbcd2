//! Located file descriptors returned to clients

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A file found on disk for one of a patient's references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Base name including extension
    pub filename: String,
    /// Lowercase extension without the leading dot, empty when there is none
    pub filetype: String,
    /// Absolute path below the export root
    pub file_path: PathBuf,
    /// Collection the reference was first seen in
    pub collection: String,
}

impl FileDescriptor {
    /// Build a descriptor for `path`.
    ///
    /// Returns `None` for paths without a UTF-8 file name, which cannot be
    /// represented in a JSON manifest.
    pub fn from_path(path: &Path, collection: impl Into<String>) -> Option<Self> {
        path.to_str()?;
        let filename = path.file_name()?.to_str()?.to_string();
        let filetype = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        Some(Self {
            filename,
            filetype,
            file_path: path.to_path_buf(),
            collection: collection.into(),
        })
    }
}
