//! Validation stage
//!
//! Resolves every intake URL to descriptive metadata (or a per-item
//! rejection) before any download starts. URLs are processed in fixed-width
//! batches: batches run sequentially, items within a batch concurrently,
//! which bounds peak outbound requests to the extractor while still
//! overlapping latency. A per-item failure is an outcome, not a pipeline
//! fault.

use crate::services::extractor::{self, MediaExtractor};
use crate::types::{ItemState, WorkItem};
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tunebatch_common::events::{EventBus, PipelineEvent};
use uuid::Uuid;

/// Validation stage
pub struct ValidationStage {
    extractor: Arc<dyn MediaExtractor>,
    events: EventBus,
    batch_width: usize,
}

impl ValidationStage {
    pub fn new(extractor: Arc<dyn MediaExtractor>, events: EventBus, batch_width: usize) -> Self {
        Self {
            extractor,
            events,
            batch_width: batch_width.max(1),
        }
    }

    /// Validate a URL list, returning one item per URL in input order
    ///
    /// The returned list always has the same length as the input; every item
    /// is either Valid (with its captured description) or Invalid (with a
    /// reason).
    pub async fn validate(&self, batch_id: Uuid, urls: &[String]) -> Vec<WorkItem> {
        let total = urls.len();
        let completed = Arc::new(AtomicUsize::new(0));

        tracing::info!(batch_id = %batch_id, total, "Starting URL validation");

        self.emit_progress(
            batch_id,
            0,
            total,
            format!("Starting validation of {} URLs", total),
            String::new(),
            false,
        );

        let mut items: Vec<WorkItem> = urls
            .iter()
            .enumerate()
            .map(|(index, url)| WorkItem::new(url.clone(), index))
            .collect();

        let mut validated: Vec<WorkItem> = Vec::with_capacity(total);

        while !items.is_empty() {
            let batch: Vec<WorkItem> = items
                .drain(..self.batch_width.min(items.len()))
                .collect();

            let futures = batch.into_iter().map(|item| {
                let completed = Arc::clone(&completed);
                async move { self.validate_one(batch_id, item, total, completed).await }
            });

            // Await the whole batch before dispatching the next one
            validated.extend(join_all(futures).await);
        }

        // Concurrent completion scrambles order; restore the intake order
        validated.sort_by_key(|item| item.index);
        validated
    }

    async fn validate_one(
        &self,
        batch_id: Uuid,
        mut item: WorkItem,
        total: usize,
        completed: Arc<AtomicUsize>,
    ) -> WorkItem {
        self.emit_progress(
            batch_id,
            completed.load(Ordering::SeqCst),
            total,
            format!("Validating URL {} of {}", item.index + 1, total),
            item.url.clone(),
            false,
        );

        item.state = ItemState::Validating;

        if !extractor::is_watch_url(&item.url) {
            tracing::debug!(url = %item.url, "Rejected malformed watch URL");
            item.mark_invalid("Unsupported or malformed watch URL");
        } else {
            match self.extractor.describe(&item.url).await {
                Ok(description) => {
                    tracing::debug!(
                        url = %item.url,
                        title = %description.title,
                        "URL validated"
                    );
                    item.mark_valid(description);
                }
                Err(e) => {
                    tracing::warn!(url = %item.url, error = %e, "Validation failed");
                    item.mark_invalid(e.to_string());
                }
            }
        }

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        let is_complete = done == total;
        let status = if is_complete {
            "Validation complete!".to_string()
        } else {
            format!("Validated {} of {} URLs", done, total)
        };
        self.emit_progress(batch_id, done, total, status, item.url.clone(), is_complete);

        item
    }

    fn emit_progress(
        &self,
        batch_id: Uuid,
        current: usize,
        total: usize,
        status: String,
        current_url: String,
        is_complete: bool,
    ) {
        self.events.emit(PipelineEvent::ValidationProgress {
            batch_id,
            current,
            total,
            status,
            current_url,
            is_complete,
            timestamp: Utc::now(),
        });
    }
}
