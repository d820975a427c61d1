//! tunebatch-dl library interface
//!
//! Batch media acquisition pipeline: validates source URLs with bounded
//! concurrency, downloads and tags each valid item, reconciles noisy titles
//! against MusicBrainz, and packages the results into a zip plus a per-item
//! report.

pub mod pipeline;
pub mod services;
pub mod types;

pub use crate::pipeline::BatchOrchestrator;
pub use crate::types::{BatchReport, FailedItem, ItemState, WorkItem};
pub use tunebatch_common::config::{ConfigOverrides, PipelineConfig};
pub use tunebatch_common::events::{EventBus, PipelineEvent, ProgressSubscription};
