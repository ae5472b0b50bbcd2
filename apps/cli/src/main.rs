use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use records_files::{
    extract_references, reference_basename, write_archive, ArchiveOptions, ExportRoot,
    FileDescriptor, FileLocator,
    FsFileLocator,
};
use serde_json::Value;

#[derive(Parser)]
#[command(
    name = "records",
    about = "Inspect a patient records export tree",
    version,
    arg_required_else_help = true
)]
struct Cli {
    /// Export root directory.
    #[arg(long, global = true, env = "EXPORT_FILES_PATH", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every file below the export root with the given base name.
    Locate {
        /// File name or reference; directories in it are ignored.
        reference: String,
    },

    /// Resolve a client file id to its absolute path inside the export root.
    Resolve {
        file_id: String,
    },

    /// Build a file manifest from the references in a JSON document.
    Refs {
        /// Document JSON file (or "-" for stdin).
        document: PathBuf,
        /// Collection to attribute the files to.
        #[arg(short, long, default_value = "document")]
        collection: String,
        /// Pretty-print JSON output.
        #[arg(short, long, action = ArgAction::SetTrue)]
        pretty: bool,
    },

    /// Bundle files into a zip archive.
    Archive {
        /// Archive to write.
        output: PathBuf,
        /// File ids, relative to the export root.
        #[arg(required = true)]
        file_ids: Vec<String>,
        /// Deflate level, 0-9.
        #[arg(short = 'l', long, default_value_t = 9)]
        level: i64,
    },

    /// Print CLI version.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Locate { reference } => {
            let root = export_root(cli.root.as_deref())?;
            run_locate(&root, &reference)?;
        }
        Commands::Resolve { file_id } => {
            let root = export_root(cli.root.as_deref())?;
            let path = root
                .resolve(&file_id)
                .with_context(|| format!("Failed to resolve {}", file_id))?;
            println!("{}", path.display());
        }
        Commands::Refs {
            document,
            collection,
            pretty,
        } => {
            let root = export_root(cli.root.as_deref())?;
            run_refs(&root, &document, &collection, pretty)?;
        }
        Commands::Archive {
            output,
            file_ids,
            level,
        } => {
            let root = export_root(cli.root.as_deref())?;
            run_archive(&root, &output, &file_ids, level)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "records_files=debug" } else { "records_files=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn export_root(root: Option<&Path>) -> Result<ExportRoot> {
    let Some(root) = root else {
        bail!("No export root given: pass --root or set EXPORT_FILES_PATH");
    };
    ExportRoot::new(root).with_context(|| format!("Invalid export root {}", root.display()))
}

fn run_locate(root: &ExportRoot, reference: &str) -> Result<()> {
    let locator = FsFileLocator::new(root.path());
    let found = locator.locate(reference)?;
    if found.is_empty() {
        eprintln!("No file named {} below {}", reference, root.path().display());
    }
    for path in found {
        println!("{}", path.display());
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<Value> {
    let mut raw = String::new();
    if path == Path::new("-") {
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read document from stdin")?;
    } else {
        raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }
    serde_json::from_str(&raw).context("Document is not valid JSON")
}

fn manifest_for(root: &ExportRoot, document: &Value, collection: &str) -> Result<Vec<FileDescriptor>> {
    let locator = FsFileLocator::new(root.path());
    let references = extract_references(document);
    let names: BTreeSet<&str> = references
        .iter()
        .map(|reference| reference_basename(reference))
        .filter(|name| !name.is_empty())
        .collect();

    let mut manifest = Vec::new();
    for name in names {
        for path in locator.locate(name)? {
            if !root.contains(&path) {
                continue;
            }
            if let Some(descriptor) = FileDescriptor::from_path(&path, collection) {
                manifest.push(descriptor);
            }
        }
    }
    Ok(manifest)
}

fn run_refs(root: &ExportRoot, document: &Path, collection: &str, pretty: bool) -> Result<()> {
    let document = read_document(document)?;
    let manifest = manifest_for(root, &document, collection)?;
    if pretty {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        println!("{}", serde_json::to_string(&manifest)?);
    }
    Ok(())
}

fn run_archive(root: &ExportRoot, output: &Path, file_ids: &[String], level: i64) -> Result<()> {
    let mut resolved = Vec::with_capacity(file_ids.len());
    for file_id in file_ids {
        match root.resolve(file_id) {
            Ok(path) => resolved.push(path),
            Err(e) => eprintln!("Skipping {}: {}", file_id, e),
        }
    }
    if resolved.is_empty() {
        bail!("No files found to archive");
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let options = ArchiveOptions {
        compression_level: level.clamp(0, 9),
    };
    let (_file, summary) = write_archive(file, root, &resolved, &options)?;

    for failed in &summary.failed {
        eprintln!("Skipped {}: {}", failed.source.display(), failed.reason);
    }
    eprintln!(
        "Wrote {} entries to {}",
        summary.entries.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn export() -> (TempDir, ExportRoot) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("notes_files")).unwrap();
        fs::write(dir.path().join("notes_files/note2.txt"), b"note").unwrap();
        let root = ExportRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn missing_root_is_reported() {
        let err = export_root(None).unwrap_err();
        assert!(err.to_string().contains("EXPORT_FILES_PATH"));
    }

    #[test]
    fn manifest_lists_located_references() {
        let (_dir, root) = export();
        let document = json!({
            "attachments": [
                {"reference": "note2.txt"},
                {"reference": "old/note2.txt"},
                {"reference": "missing.pdf"}
            ]
        });
        let manifest = manifest_for(&root, &document, "notes").unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].filename, "note2.txt");
        assert_eq!(manifest[0].collection, "notes");
    }

    #[test]
    fn archive_skips_escaping_ids() {
        let (dir, root) = export();
        let output = dir.path().join("out.zip");
        run_archive(
            &root,
            &output,
            &["notes_files/note2.txt".to_string(), "../../etc/passwd".to_string()],
            6,
        )
        .unwrap();
        assert!(output.is_file());
    }

    #[test]
    fn archive_with_nothing_resolvable_fails() {
        let (dir, root) = export();
        let output = dir.path().join("out.zip");
        assert!(run_archive(&root, &output, &["../x".to_string()], 6).is_err());
        assert!(!output.exists());
    }
}
