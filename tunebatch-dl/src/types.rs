//! Shared types and data contracts for the acquisition pipeline
//!
//! Each type is an explicit contract between pipeline stages: the driver
//! owns the `WorkItem` list for the duration of one batch run, stages
//! consume and return items, and the aggregator freezes the outcome into an
//! immutable `BatchReport`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle state of a single work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// Accepted at intake, not yet examined
    Pending,
    /// Validation call in flight
    Validating,
    /// Validated; descriptive metadata captured
    Valid,
    /// Rejected during validation (terminal)
    Invalid,
    /// Audio download in flight
    Acquiring,
    /// Audio present, tag write in flight
    Tagging,
    /// Fully acquired (terminal)
    Done,
    /// Acquisition failed after successful validation (terminal)
    Failed,
}

impl ItemState {
    /// Whether this state ends the item's lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Invalid | ItemState::Done | ItemState::Failed)
    }
}

/// Descriptive metadata captured from the source during validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescription {
    pub title: String,
    pub author: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: f64,
}

/// Catalog-reconciled metadata that supersedes the source description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub recording_id: String,
}

/// One URL's lifecycle record, tracked from intake to terminal state
///
/// `index` is assigned once at intake and never changes; concurrent stages
/// complete out of order and downstream collections re-sort by it before
/// reporting.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: String,
    pub index: usize,
    pub state: ItemState,
    pub descriptive: Option<SourceDescription>,
    pub reconciled: Option<ReconciledMetadata>,
    pub artifact_path: Option<PathBuf>,
    pub failure_reason: Option<String>,
    /// Non-fatal degradation noted during acquisition (e.g. tag write failed)
    pub warning: Option<String>,
}

impl WorkItem {
    /// Create a pending item at its intake position
    pub fn new(url: impl Into<String>, index: usize) -> Self {
        Self {
            url: url.into(),
            index,
            state: ItemState::Pending,
            descriptive: None,
            reconciled: None,
            artifact_path: None,
            failure_reason: None,
            warning: None,
        }
    }

    /// Transition into Valid with the captured description
    pub fn mark_valid(&mut self, description: SourceDescription) {
        self.descriptive = Some(description);
        self.state = ItemState::Valid;
    }

    /// Transition into the terminal Invalid state
    pub fn mark_invalid(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = ItemState::Invalid;
    }

    /// Transition into the terminal Failed state
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = ItemState::Failed;
    }

    /// Transition into the terminal Done state with the produced artifact
    pub fn mark_done(&mut self, artifact_path: PathBuf) {
        self.artifact_path = Some(artifact_path);
        self.state = ItemState::Done;
    }

    /// Title to use for presentation and archive entry naming:
    /// reconciled title when a match was accepted, source title otherwise
    pub fn display_title(&self) -> &str {
        if let Some(reconciled) = &self.reconciled {
            &reconciled.title
        } else if let Some(descriptive) = &self.descriptive {
            &descriptive.title
        } else {
            &self.url
        }
    }
}

/// Candidate produced by catalog matching, discarded after accept/reject
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub recording_id: String,
    pub title_similarity: f64,
    pub artist_similarity: f64,
}

/// A failed item as presented in the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub url: String,
    pub error: String,
}

/// Immutable terminal snapshot of one full batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Count of items that reached Done
    pub successful: usize,
    /// Count of items that ended Invalid or Failed
    pub failed: usize,
    /// Acquisition failures first, then validation failures, each group in
    /// original index order
    pub failures: Vec<FailedItem>,
    /// Non-fatal degradations (tag-write failures and the like)
    pub warnings: Vec<String>,
    /// Archive location; None when no item succeeded or packaging failed
    pub archive_path: Option<PathBuf>,
}
