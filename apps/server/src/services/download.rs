//! Single file and bulk zip downloads
//!
//! Bulk archives are written completely into a named temporary file before
//! any byte is sent. The response stream owns that file, so it is removed
//! once the body has been sent, fails, or is dropped by a disconnecting
//! client.

use crate::metrics::{record_partial_failure, stage, ARCHIVE_ENTRIES};
use crate::{Error, Result};
use axum::body::{Body, Bytes};
use futures::Stream;
use records_files::{write_archive, ArchiveOptions, ArchiveSummary, ExportRoot};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// An opened export file ready to be streamed.
#[derive(Debug)]
pub struct FileDownload {
    pub file: tokio::fs::File,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

impl FileDownload {
    pub fn into_body(self) -> Body {
        Body::from_stream(read_chunks(self.file, None))
    }
}

/// A finalized zip archive staged on disk.
pub struct BulkArchive {
    file: NamedTempFile,
    pub filename: String,
    pub size: u64,
    pub summary: ArchiveSummary,
}

impl BulkArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Stream the archive; the temporary file goes away with the stream.
    pub fn into_body(self) -> Result<Body> {
        let reader = tokio::fs::File::from_std(self.file.reopen()?);
        Ok(Body::from_stream(read_chunks(reader, Some(self.file))))
    }
}

fn read_chunks(
    mut file: tokio::fs::File,
    staged: Option<NamedTempFile>,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    async_stream::try_stream! {
        let _staged = staged;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    }
}

/// Keep ids usable inside file names and header values.
pub fn safe_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct DownloadService {
    export_root: ExportRoot,
    temp_dir: PathBuf,
    archive_options: ArchiveOptions,
}

impl DownloadService {
    pub fn new(export_root: ExportRoot, temp_dir: PathBuf, compression_level: i64) -> Self {
        Self {
            export_root,
            temp_dir,
            archive_options: ArchiveOptions { compression_level },
        }
    }

    pub fn export_root(&self) -> &ExportRoot {
        &self.export_root
    }

    /// Open one file for download after containment checks.
    pub async fn open_file(&self, file_path: &str) -> Result<FileDownload> {
        if file_path.trim().is_empty() {
            return Err(Error::BadRequest("File path is required".to_string()));
        }

        let root = self.export_root.clone();
        let requested = file_path.to_string();
        let path = tokio::task::spawn_blocking(move || root.resolve(&requested))
            .await
            .map_err(|e| Error::Internal(format!("path resolution task failed: {}", e)))??;

        let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound("File not found".to_string()),
            _ => Error::Io(e),
        })?;
        let size = file.metadata().await?.len();

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
            .to_string();
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        tracing::info!(path = %path.display(), size, "Serving file download");
        Ok(FileDownload {
            file,
            filename,
            content_type,
            size,
        })
    }

    /// Zip the requested files of a patient.
    ///
    /// Ids that do not resolve inside the export root are skipped.
    ///
    /// # Errors
    /// * `BadRequest` - empty patient id or no file ids
    /// * `NotFound` - none of the ids produced an archive entry
    #[tracing::instrument(name = "build_archive", skip(self, file_ids), fields(requested = file_ids.len()))]
    pub async fn build_archive(&self, patient_id: &str, file_ids: &[String]) -> Result<BulkArchive> {
        if patient_id.trim().is_empty() || file_ids.is_empty() {
            return Err(Error::BadRequest("Invalid request parameters".to_string()));
        }

        let service = self.clone();
        let patient_id = patient_id.to_string();
        let file_ids = file_ids.to_vec();
        tokio::task::spawn_blocking(move || service.build_archive_blocking(&patient_id, &file_ids))
            .await
            .map_err(|e| Error::Internal(format!("archive task failed: {}", e)))?
    }

    fn build_archive_blocking(&self, patient_id: &str, file_ids: &[String]) -> Result<BulkArchive> {
        let mut resolved = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            match self.export_root.resolve(file_id) {
                Ok(path) => resolved.push(path),
                Err(e) => {
                    tracing::warn!(file_id = %file_id, reason = e.kind(), "Skipping file");
                    record_partial_failure(stage::RESOLVE);
                }
            }
        }

        if resolved.is_empty() {
            return Err(Error::NotFound("No files found to download".to_string()));
        }

        let safe_id = safe_file_component(patient_id);
        let staged = tempfile::Builder::new()
            .prefix(&format!("patient_{}_", safe_id))
            .suffix(".zip")
            .tempfile_in(&self.temp_dir)?;

        let (mut staged, summary) =
            write_archive(staged, &self.export_root, &resolved, &self.archive_options)?;
        staged.flush()?;

        for _ in &summary.failed {
            record_partial_failure(stage::ARCHIVE);
        }
        if summary.is_empty() {
            return Err(Error::NotFound("No files found to download".to_string()));
        }

        let size = staged.as_file().metadata()?.len();
        ARCHIVE_ENTRIES.observe(summary.entries.len() as f64);
        tracing::info!(
            entries = summary.entries.len(),
            skipped = summary.failed.len(),
            size,
            "Bulk archive ready"
        );

        Ok(BulkArchive {
            file: staged,
            filename: format!("patient_{}_files.zip", safe_id),
            size,
            summary,
        })
    }
}
