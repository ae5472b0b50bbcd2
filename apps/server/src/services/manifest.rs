//! Patient file manifests
//!
//! Documents point at files by name only. The manifest collects every
//! `reference` across the patient's documents, searches the export tree once
//! per distinct base name and flattens the hits into file descriptors.

use super::aggregate::PatientDocumentAggregator;
use crate::metrics::{record_partial_failure, stage, FILE_WALKS_TOTAL, MANIFEST_FILES};
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use records_files::{
    extract_references, reference_basename, ExportRoot, FileDescriptor, FileLocator,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

pub struct FileManifestBuilder {
    aggregator: Arc<PatientDocumentAggregator>,
    locator: Arc<dyn FileLocator>,
    export_root: ExportRoot,
    concurrency: usize,
}

impl FileManifestBuilder {
    pub fn new(
        aggregator: Arc<PatientDocumentAggregator>,
        locator: Arc<dyn FileLocator>,
        export_root: ExportRoot,
        concurrency: usize,
    ) -> Self {
        Self {
            aggregator,
            locator,
            export_root,
            concurrency: concurrency.max(1),
        }
    }

    /// Files referenced by any of the patient's documents.
    ///
    /// A reference seen in several collections is attributed to the first one
    /// in collection name order. References that match nothing, or whose
    /// search fails, contribute no descriptors.
    #[tracing::instrument(name = "build_manifest", skip(self))]
    pub async fn build_manifest(&self, patient_id: &str) -> Result<Vec<FileDescriptor>> {
        let documents = self.aggregator.aggregate(patient_id).await?;

        let mut seen = HashSet::new();
        let mut references: Vec<(String, String)> = Vec::new();
        for (collection, docs) in &documents {
            for doc in docs {
                for reference in extract_references(doc) {
                    // the locator matches on base name only
                    let name = reference_basename(&reference);
                    if !name.is_empty() && seen.insert(name.to_string()) {
                        references.push((name.to_string(), collection.clone()));
                    }
                }
            }
        }
        tracing::debug!(references = references.len(), "Collected file references");

        let located: Vec<(String, Result<Vec<PathBuf>>)> = stream::iter(references)
            .map(|(reference, collection)| async move {
                let result = self.locate(&reference).await;
                ((reference, collection), result)
            })
            .buffered(self.concurrency)
            .map(|((reference, collection), result)| {
                if let Err(e) = &result {
                    tracing::warn!(reference = %reference, error = %e, "Failed to locate file");
                    record_partial_failure(stage::LOCATE);
                }
                (collection, result)
            })
            .collect()
            .await;

        let mut manifest = Vec::new();
        for (collection, paths) in located {
            for path in paths.unwrap_or_default() {
                if !self.export_root.contains(&path) {
                    tracing::warn!(path = %path.display(), "Dropping located file outside export root");
                    record_partial_failure(stage::LOCATE);
                    continue;
                }
                match FileDescriptor::from_path(&path, collection.as_str()) {
                    Some(descriptor) => manifest.push(descriptor),
                    None => record_partial_failure(stage::LOCATE),
                }
            }
        }

        MANIFEST_FILES.observe(manifest.len() as f64);
        tracing::info!(files = manifest.len(), "Built patient file manifest");
        Ok(manifest)
    }

    async fn locate(&self, reference: &str) -> Result<Vec<PathBuf>> {
        FILE_WALKS_TOTAL.inc();
        let locator = Arc::clone(&self.locator);
        let reference = reference.to_string();
        tokio::task::spawn_blocking(move || locator.locate(&reference))
            .await
            .map_err(|e| Error::Internal(format!("file search task failed: {}", e)))?
            .map_err(Error::from)
    }
}
