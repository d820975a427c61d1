//! Batch pipeline orchestration
//!
//! The orchestrator owns the collaborators and the WorkItem list for the
//! duration of one batch run and drives the three stages in order:
//! validation → acquisition → report aggregation. Callers observe progress
//! through the event bus; a run either completes (possibly with many
//! per-item failures) or the process is externally terminated; there is no
//! mid-batch cancellation.

pub mod acquisition;
pub mod report;
pub mod validation;

pub use acquisition::AcquisitionStage;
pub use report::ReportAggregator;
pub use validation::ValidationStage;

use crate::services::archive_builder::ArchiveBuilder;
use crate::services::catalog_matcher::CatalogMatcher;
use crate::services::extractor::MediaExtractor;
use crate::services::musicbrainz_client::{MusicBrainzClient, RecordingCatalog};
use crate::services::tag_writer::{TagSink, TagWriter};
use crate::services::YtDlpExtractor;
use crate::types::{BatchReport, WorkItem};
use chrono::Utc;
use std::sync::Arc;
use tunebatch_common::config::PipelineConfig;
use tunebatch_common::events::{EventBus, PipelineEvent, ProgressSubscription};
use tunebatch_common::{Error, Result};
use uuid::Uuid;

/// Batch pipeline orchestrator
pub struct BatchOrchestrator {
    batch_id: Uuid,
    config: PipelineConfig,
    events: EventBus,
    validation: ValidationStage,
    acquisition: AcquisitionStage,
    aggregator: ReportAggregator,
}

impl BatchOrchestrator {
    /// Create an orchestrator over explicit collaborators
    ///
    /// Creates the temp and output directories if missing.
    pub fn new(
        config: PipelineConfig,
        extractor: Arc<dyn MediaExtractor>,
        catalog: Arc<dyn RecordingCatalog>,
        tag_sink: Arc<dyn TagSink>,
    ) -> Result<Self> {
        config.ensure_directories()?;

        let events = EventBus::default();
        let validation = ValidationStage::new(
            Arc::clone(&extractor),
            events.clone(),
            config.batch_width,
        );
        let acquisition = AcquisitionStage::new(
            extractor,
            CatalogMatcher::new(catalog),
            tag_sink,
            events.clone(),
            config.temp_dir.clone(),
            config.batch_width,
            config.album_label.clone(),
        );
        let aggregator = ReportAggregator::new(ArchiveBuilder::new(config.output_dir.clone()));

        Ok(Self {
            batch_id: Uuid::new_v4(),
            config,
            events,
            validation,
            acquisition,
            aggregator,
        })
    }

    /// Create an orchestrator over the production collaborators
    /// (yt-dlp extractor, MusicBrainz catalog, ID3 tag writer)
    pub fn with_defaults(config: PipelineConfig) -> Result<Self> {
        let extractor = YtDlpExtractor::new();
        extractor
            .check_available()
            .map_err(|e| Error::Config(e.to_string()))?;

        let catalog =
            MusicBrainzClient::new().map_err(|e| Error::Internal(e.to_string()))?;

        Self::new(
            config,
            Arc::new(extractor),
            Arc::new(catalog),
            Arc::new(TagWriter::new()),
        )
    }

    /// Identifier stamped on every progress event of this run
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Subscribe to progress events; drop the handle to detach
    pub fn subscribe(&self) -> ProgressSubscription {
        self.events.subscribe()
    }

    /// Validate a batch of URLs, returning one item per URL in input order
    pub async fn validate_batch(&self, urls: &[String]) -> Vec<WorkItem> {
        self.validation.validate(self.batch_id, urls).await
    }

    /// Run acquisition over validated items and finalize the report
    pub async fn run_batch(&self, items: Vec<WorkItem>) -> BatchReport {
        let outcomes = self.acquisition.acquire_all(self.batch_id, items).await;
        let report = self.aggregator.finalize(outcomes);

        self.events.emit(PipelineEvent::BatchCompleted {
            batch_id: self.batch_id,
            successful: report.successful,
            failed: report.failed,
            timestamp: Utc::now(),
        });

        report
    }

    /// Clear the temporary working area
    ///
    /// Idempotent: files already removed (or a temp directory that never
    /// materialized) are not errors.
    pub async fn cleanup(&self) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.config.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }

        Ok(())
    }
}
