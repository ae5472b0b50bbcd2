//! Zip bundling of resolved export files.
//!
//! Entries are named by the file's base name. When two files share a base
//! name, the later one is stored under its path relative to the export root
//! instead, so no entry is silently replaced. The exact same file requested
//! twice is written once.

use crate::error::Result;
use crate::resolver::ExportRoot;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Deflate level, 0-9
    pub compression_level: i64,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub source: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub source: PathBuf,
    pub reason: String,
}

/// What ended up in an archive and what was left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: Vec<ArchiveEntry>,
    pub duplicates: Vec<PathBuf>,
    pub failed: Vec<FailedEntry>,
}

impl ArchiveSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write `files` (already resolved inside `root`) into a zip on `writer`.
///
/// A file that cannot be read is skipped and reported in
/// [`ArchiveSummary::failed`]; any entry already started for it is discarded.
/// The archive is finalized before returning, and the writer is handed back.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    root: &ExportRoot,
    files: &[PathBuf],
    options: &ArchiveOptions,
) -> Result<(W, ArchiveSummary)> {
    let mut zip = ZipWriter::new(writer);
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(options.compression_level))
        .large_file(true);

    let mut summary = ArchiveSummary::default();
    let mut taken: HashSet<String> = HashSet::new();
    let mut seen: HashSet<&Path> = HashSet::new();

    for source in files {
        if !seen.insert(source.as_path()) {
            summary.duplicates.push(source.clone());
            continue;
        }

        let Some(name) = entry_name(root, source, &taken) else {
            summary.failed.push(FailedEntry {
                source: source.clone(),
                reason: "no usable entry name".to_string(),
            });
            continue;
        };

        let mut input = match File::open(source) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "Skipping unreadable file");
                summary.failed.push(FailedEntry {
                    source: source.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        zip.start_file(name.as_str(), file_options)?;
        match io::copy(&mut input, &mut zip) {
            Ok(size) => {
                tracing::debug!(entry = %name, size, "Added file to archive");
                taken.insert(name.clone());
                summary.entries.push(ArchiveEntry {
                    name,
                    source: source.clone(),
                    size,
                });
            }
            Err(e) => {
                tracing::warn!(path = %source.display(), error = %e, "Failed to copy file into archive");
                zip.abort_file()?;
                summary.failed.push(FailedEntry {
                    source: source.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let writer = zip.finish()?;
    Ok((writer, summary))
}

/// Base name when free, otherwise the root-relative path with `/` separators.
fn entry_name(root: &ExportRoot, source: &Path, taken: &HashSet<String>) -> Option<String> {
    let base = source.file_name()?.to_str()?.to_string();
    if !taken.contains(&base) {
        return Some(base);
    }

    let relative = root.relative(source)?;
    let parts: Option<Vec<&str>> = relative.iter().map(|part| part.to_str()).collect();
    let namespaced = parts?.join("/");
    (!taken.contains(&namespaced)).then_some(namespaced)
}
