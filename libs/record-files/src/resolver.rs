//! Export root containment.
//!
//! Client-supplied file ids are resolved against the export root and must end
//! up on a regular file strictly inside it. The root is a strict-path
//! [`PathBoundary`]; `strict_join` canonicalizes the candidate (following
//! symlinks) and rejects anything that lands outside the boundary. On top of
//! that, a relative id whose `..` segments climb above its starting point is
//! refused before touching the filesystem, so traversal attempts are
//! `Forbidden` even when the root is `/`.

use crate::error::{FilesError, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use strict_path::{PathBoundary, StrictPathError};

/// Canonical directory that holds every downloadable patient file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRoot {
    boundary: PathBoundary,
    path: PathBuf,
}

impl ExportRoot {
    /// Canonicalize `path` and make sure it is an existing directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let boundary = PathBoundary::<()>::try_new(path).map_err(|e| match e {
            StrictPathError::InvalidRestriction { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => {
                    FilesError::NotFound(format!("export root {}", path.display()))
                }
                io::ErrorKind::InvalidInput => FilesError::InvalidInput(format!(
                    "export root {} is not a directory",
                    path.display()
                )),
                _ => FilesError::Io(source),
            },
            other => FilesError::Io(io::Error::new(io::ErrorKind::Other, other)),
        })?;
        let canonical = PathBuf::from(boundary.interop_path());

        Ok(Self {
            boundary,
            path: canonical,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when `candidate` is the root itself or lies below it.
    pub fn contains(&self, candidate: &Path) -> bool {
        candidate.starts_with(&self.path)
    }

    /// Path of `candidate` relative to the root, when it is contained.
    pub fn relative<'a>(&self, candidate: &'a Path) -> Option<&'a Path> {
        candidate.strip_prefix(&self.path).ok()
    }

    /// Resolve a client-supplied file id to an existing regular file.
    ///
    /// Relative ids are joined onto the root. Absolute ids are accepted only
    /// when they already lie inside the root.
    ///
    /// # Errors
    /// * `InvalidInput` - empty id, or one containing a NUL byte
    /// * `Forbidden` - the id escapes the root, lexically or through a symlink
    /// * `NotFound` - nothing exists at the resolved path, or it is not a regular file
    pub fn resolve(&self, file_id: &str) -> Result<PathBuf> {
        if file_id.trim().is_empty() {
            return Err(FilesError::InvalidInput("file id is empty".to_string()));
        }
        if file_id.contains('\0') {
            return Err(FilesError::InvalidInput(
                "file id contains a NUL byte".to_string(),
            ));
        }

        let raw = Path::new(file_id);
        if !raw.has_root() && climbs_out(raw) {
            return Err(FilesError::Forbidden(self.path.join(raw)));
        }

        let strict = self.boundary.strict_join(raw).map_err(|e| match e {
            StrictPathError::PathEscapesBoundary { attempted_path, .. } => {
                FilesError::Forbidden(attempted_path)
            }
            StrictPathError::PathResolutionError { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => FilesError::NotFound(file_id.to_string()),
                io::ErrorKind::InvalidInput => FilesError::InvalidInput(source.to_string()),
                _ => FilesError::Io(source),
            },
            StrictPathError::InvalidRestriction { source, .. } => FilesError::Io(source),
        })?;

        if !strict.is_file() {
            return Err(FilesError::NotFound(format!("{} is not a file", file_id)));
        }

        Ok(strict.unstrict())
    }
}

/// Resolve `file_id` against `root`; see [`ExportRoot::resolve`].
pub fn resolve(file_id: &str, root: &Path) -> Result<PathBuf> {
    ExportRoot::new(root)?.resolve(file_id)
}

/// True when the `..` segments of a relative id reach above its first segment.
fn climbs_out(relative: &Path) -> bool {
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return true,
            },
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn export() -> (TempDir, ExportRoot) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub/dir")).unwrap();
        fs::write(dir.path().join("sub/dir/file.txt"), b"x").unwrap();
        fs::write(dir.path().join("top.pdf"), b"y").unwrap();
        let root = ExportRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn resolves_existing_relative_file() {
        let (_dir, root) = export();
        let resolved = root.resolve("sub/dir/file.txt").unwrap();
        assert_eq!(resolved, root.path().join("sub/dir/file.txt"));
    }

    #[test]
    fn missing_relative_file_is_not_found() {
        let (_dir, root) = export();
        assert!(matches!(
            root.resolve("sub/dir/other.txt"),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn directory_is_not_found() {
        let (_dir, root) = export();
        assert!(matches!(root.resolve("sub/dir"), Err(FilesError::NotFound(_))));
    }

    #[test]
    fn parent_traversal_is_forbidden() {
        let (_dir, root) = export();
        assert!(matches!(
            root.resolve("../../etc/passwd"),
            Err(FilesError::Forbidden(_))
        ));
        assert!(matches!(
            root.resolve("sub/../../outside.txt"),
            Err(FilesError::Forbidden(_))
        ));
    }

    #[test]
    fn parent_traversal_is_forbidden_even_at_filesystem_root() {
        let root = ExportRoot::new("/").unwrap();
        assert!(matches!(
            root.resolve("../../etc/passwd"),
            Err(FilesError::Forbidden(_))
        ));
    }

    #[test]
    fn inner_parent_segments_that_stay_inside_are_allowed() {
        let (_dir, root) = export();
        let resolved = root.resolve("sub/dir/../../top.pdf").unwrap();
        assert_eq!(resolved, root.path().join("top.pdf"));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let (_dir, root) = export();
        let absolute = root.path().join("top.pdf");
        assert_eq!(root.resolve(absolute.to_str().unwrap()).unwrap(), absolute);
    }

    #[test]
    fn absolute_path_outside_root_is_forbidden() {
        let (_dir, root) = export();
        assert!(matches!(
            root.resolve("/etc/passwd"),
            Err(FilesError::Forbidden(_))
        ));
        let sneaky = format!("{}/../elsewhere.txt", root.path().display());
        assert!(matches!(root.resolve(&sneaky), Err(FilesError::Forbidden(_))));
    }

    #[test]
    fn sibling_with_shared_prefix_is_forbidden() {
        let parent = TempDir::new().unwrap();
        fs::create_dir_all(parent.path().join("root")).unwrap();
        fs::create_dir_all(parent.path().join("root-evil")).unwrap();
        fs::write(parent.path().join("root-evil/secret.txt"), b"s").unwrap();

        let root = ExportRoot::new(parent.path().join("root")).unwrap();
        let evil = root.path().with_file_name("root-evil").join("secret.txt");
        assert!(matches!(
            root.resolve(evil.to_str().unwrap()),
            Err(FilesError::Forbidden(_))
        ));
        assert!(matches!(
            root.resolve("../root-evil/secret.txt"),
            Err(FilesError::Forbidden(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_forbidden() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"s").unwrap();
        let (dir, root) = export();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            root.resolve("link/secret.txt"),
            Err(FilesError::Forbidden(_))
        ));
    }

    #[test]
    fn empty_id_is_invalid() {
        let (_dir, root) = export();
        assert!(matches!(root.resolve(""), Err(FilesError::InvalidInput(_))));
        assert!(matches!(root.resolve("   "), Err(FilesError::InvalidInput(_))));
    }

    #[test]
    fn nul_byte_is_invalid_input() {
        let (_dir, root) = export();
        assert!(matches!(
            root.resolve("sub/a\0b.pdf"),
            Err(FilesError::InvalidInput(_))
        ));
    }

    #[test]
    fn climbing_is_detected_per_segment() {
        assert!(climbs_out(Path::new("..")));
        assert!(climbs_out(Path::new("a/../../b")));
        assert!(!climbs_out(Path::new("a/b/../c")));
        assert!(!climbs_out(Path::new("./a")));
    }

    #[test]
    fn export_root_must_be_a_directory() {
        let (dir, _root) = export();
        assert!(matches!(
            ExportRoot::new(dir.path().join("top.pdf")),
            Err(FilesError::InvalidInput(_))
        ));
    }

    #[test]
    fn export_root_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ExportRoot::new(dir.path().join("nope")),
            Err(FilesError::NotFound(_))
        ));
    }

    #[test]
    fn free_function_matches_method() {
        let (dir, root) = export();
        assert_eq!(
            resolve("top.pdf", dir.path()).unwrap(),
            root.resolve("top.pdf").unwrap()
        );
    }
}
