//! Report aggregation
//!
//! Merges validation rejections and acquisition outcomes into one immutable
//! BatchReport, drives archive packaging, and cleans up archived source
//! artifacts. Packaging and cleanup are best-effort: their failures degrade
//! the report, never the batch.

use crate::services::archive_builder::{self, ArchiveBuilder, ArchiveEntry};
use crate::types::{BatchReport, FailedItem, ItemState, WorkItem};
use std::path::Path;

/// Report aggregator
pub struct ReportAggregator {
    archive_builder: ArchiveBuilder,
}

impl ReportAggregator {
    pub fn new(archive_builder: ArchiveBuilder) -> Self {
        Self { archive_builder }
    }

    /// Freeze the outcome of one batch run into a BatchReport
    ///
    /// Every item lands in exactly one bucket. Failure presentation order:
    /// acquisition failures first, then validation failures, each group in
    /// original index order.
    pub fn finalize(&self, mut items: Vec<WorkItem>) -> BatchReport {
        items.sort_by_key(|item| item.index);

        let mut successes: Vec<&WorkItem> = Vec::new();
        let mut acquisition_failures: Vec<FailedItem> = Vec::new();
        let mut validation_failures: Vec<FailedItem> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        for item in &items {
            if let Some(warning) = &item.warning {
                warnings.push(warning.clone());
            }

            match item.state {
                ItemState::Done if item.artifact_path.is_some() => successes.push(item),
                ItemState::Invalid => validation_failures.push(FailedItem {
                    url: item.url.clone(),
                    error: item
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "Invalid URL".to_string()),
                }),
                _ => acquisition_failures.push(FailedItem {
                    url: item.url.clone(),
                    error: item
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string()),
                }),
            }
        }

        let archive_path = if successes.is_empty() {
            tracing::info!("No successful acquisitions, skipping archive");
            None
        } else {
            let entries: Vec<ArchiveEntry> = successes
                .iter()
                .filter_map(|item| {
                    item.artifact_path.as_ref().map(|path| ArchiveEntry {
                        file_path: path.clone(),
                        display_name: item.display_title().to_string(),
                    })
                })
                .collect();

            match self.archive_builder.build(&entries) {
                Ok(path) => {
                    // Archived artifacts are no longer needed in the temp area
                    let archived: Vec<&Path> =
                        entries.iter().map(|e| e.file_path.as_path()).collect();
                    archive_builder::remove_artifacts(&archived);
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Archive packaging failed, reporting without archive");
                    None
                }
            }
        };

        let successful = successes.len();
        let mut failures = acquisition_failures;
        failures.extend(validation_failures);

        let report = BatchReport {
            successful,
            failed: failures.len(),
            failures,
            warnings,
            archive_path,
        };

        tracing::info!(
            successful = report.successful,
            failed = report.failed,
            archive = ?report.archive_path,
            "Batch report finalized"
        );

        report
    }
}
