//! File side of the patient records pipeline
//!
//! Everything here works against the filesystem and plain JSON documents,
//! with no database or HTTP concerns:
//! - [`reference`]: collect `reference` values from arbitrarily nested documents
//! - [`locator`]: find files by base name anywhere below an export root
//! - [`resolver`]: turn client-supplied file ids into contained absolute paths
//! - [`archive`]: bundle resolved files into a zip archive
//! - [`descriptor`]: the `FileDescriptor` shape returned to clients

pub mod archive;
pub mod descriptor;
pub mod error;
pub mod locator;
pub mod reference;
pub mod resolver;

pub use archive::{write_archive, ArchiveEntry, ArchiveOptions, ArchiveSummary, FailedEntry};
pub use descriptor::FileDescriptor;
pub use error::{FilesError, Result};
pub use locator::{find_file, FileLocator, FsFileLocator};
pub use reference::{extract_references, reference_basename, REFERENCE_KEY};
pub use resolver::{resolve, ExportRoot};
