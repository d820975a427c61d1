//! Archive packaging of completed downloads
//!
//! Bundles the successful artifacts of one batch run into a single deflated
//! zip in the output directory. In-archive names come from the reconciled
//! (or fallback) titles, sanitized so a hostile title can never escape the
//! archive root.

use chrono::Utc;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Archive builder errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// One artifact to package
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub file_path: PathBuf,
    pub display_name: String,
}

/// Zip archive builder
pub struct ArchiveBuilder {
    output_dir: PathBuf,
}

impl ArchiveBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Package the given artifacts into a timestamped zip
    ///
    /// Entries whose source file has gone missing are skipped rather than
    /// failing the archive. Returns the path of the written archive.
    pub fn build(&self, entries: &[ArchiveEntry]) -> Result<PathBuf, ArchiveError> {
        let archive_path = self
            .output_dir
            .join(format!("tunebatch-{}.zip", Utc::now().timestamp_millis()));

        let file = File::create(&archive_path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut used_names: HashSet<String> = HashSet::new();
        let mut packaged = 0usize;

        for entry in entries {
            if !entry.file_path.exists() {
                tracing::warn!(
                    path = %entry.file_path.display(),
                    "Artifact vanished before packaging, skipping"
                );
                continue;
            }

            let entry_name = unique_entry_name(&entry.display_name, &mut used_names);
            zip.start_file(&entry_name, options)?;

            let mut source = File::open(&entry.file_path)?;
            std::io::copy(&mut source, &mut zip)?;
            packaged += 1;

            tracing::debug!(
                entry = %entry_name,
                source = %entry.file_path.display(),
                "Packaged artifact"
            );
        }

        zip.finish()?.flush()?;

        tracing::info!(
            archive = %archive_path.display(),
            packaged,
            "Archive written"
        );

        Ok(archive_path)
    }
}

/// Sanitize a display title into a collision-free `.mp3` entry name
fn unique_entry_name(display_name: &str, used: &mut HashSet<String>) -> String {
    let mut base = sanitize_filename::sanitize(display_name);
    if base.is_empty() {
        base = "track".to_string();
    }

    let mut candidate = format!("{}.mp3", base);
    let mut counter = 2;
    while !used.insert(candidate.clone()) {
        candidate = format!("{} ({}).mp3", base, counter);
        counter += 1;
    }
    candidate
}

/// Best-effort removal of archived source artifacts
pub fn remove_artifacts(paths: &[&Path]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed temp artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp artifact");
            }
        }
    }
}
