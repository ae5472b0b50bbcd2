//! Locate files by base name below an export root.
//!
//! The export tree is organised by whatever produced it, not by the
//! references stored in documents, so a reference is matched purely by file
//! name. Every match is returned: the same name may legitimately exist in
//! several subdirectories.

use crate::error::{FilesError, Result};
use crate::reference::reference_basename;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Finds the files a reference points at.
///
/// Implementations are blocking; async callers should run them on the
/// blocking pool.
pub trait FileLocator: Send + Sync {
    /// All files whose base name equals the base name of `reference`.
    ///
    /// An empty result is not an error.
    fn locate(&self, reference: &str) -> Result<Vec<PathBuf>>;
}

/// Walks the real filesystem below `root`.
#[derive(Debug, Clone)]
pub struct FsFileLocator {
    root: PathBuf,
    walk_timeout: Option<Duration>,
}

impl FsFileLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            walk_timeout: None,
        }
    }

    /// Abort walks that run longer than `timeout` with [`FilesError::Timeout`].
    pub fn with_walk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.walk_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileLocator for FsFileLocator {
    fn locate(&self, reference: &str) -> Result<Vec<PathBuf>> {
        let deadline = self.walk_timeout.map(|t| Instant::now() + t);
        walk(reference_basename(reference), &self.root, deadline)
    }
}

/// Depth-first search of `root` for regular files named `basename`.
///
/// Directory entries are visited in file-name order so the result is stable
/// for a given tree. Unreadable subdirectories are skipped; an unreadable
/// root yields an empty result.
pub fn find_file(basename: &str, root: &Path) -> Vec<PathBuf> {
    match walk(basename, root, None) {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = %e, "Failed to search export root");
            Vec::new()
        }
    }
}

fn walk(basename: &str, root: &Path, deadline: Option<Instant>) -> Result<Vec<PathBuf>> {
    if basename.is_empty() {
        return Ok(Vec::new());
    }

    let wanted = OsStr::new(basename);
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(FilesError::Timeout(format!(
                    "search for '{}' below {}",
                    basename,
                    root.display()
                )));
            }
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(FilesError::Io(e.into())),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry during file search");
                continue;
            }
        };

        if entry.file_type().is_file() && entry.file_name() == wanted {
            tracing::debug!(path = %entry.path().display(), "File found");
            found.push(entry.into_path());
        }
    }

    if found.is_empty() {
        tracing::debug!(file = basename, "File not found below export root");
    }

    Ok(found)
}
