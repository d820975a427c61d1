//! Acquisition stage
//!
//! Drives each validated item through download, catalog reconciliation and
//! tag writing. Items move through the stage in fixed-width batches with a
//! settle-all join: one item's failure never cancels its siblings. The
//! audio file is the deliverable; cosmetic steps (thumbnail, tag write)
//! degrade to warnings rather than failing an otherwise-complete item.

use crate::services::catalog_matcher::CatalogMatcher;
use crate::services::extractor::{self, MediaExtractor};
use crate::services::tag_writer::{CoverImage, TagSet, TagSink};
use crate::types::{ItemState, ReconciledMetadata, SourceDescription, WorkItem};
use chrono::Utc;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tunebatch_common::events::{EventBus, PipelineEvent};
use uuid::Uuid;

/// Browser User-Agent for thumbnail hosts that refuse tool agents
const THUMBNAIL_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const THUMBNAIL_TIMEOUT_SECS: u64 = 10;

/// Acquisition stage
pub struct AcquisitionStage {
    extractor: Arc<dyn MediaExtractor>,
    matcher: CatalogMatcher,
    tag_sink: Arc<dyn TagSink>,
    events: EventBus,
    http: reqwest::Client,
    temp_dir: PathBuf,
    batch_width: usize,
    album_label: String,
}

impl AcquisitionStage {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        matcher: CatalogMatcher,
        tag_sink: Arc<dyn TagSink>,
        events: EventBus,
        temp_dir: PathBuf,
        batch_width: usize,
        album_label: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(THUMBNAIL_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            extractor,
            matcher,
            tag_sink,
            events,
            http,
            temp_dir,
            batch_width: batch_width.max(1),
            album_label,
        }
    }

    /// Acquire every Valid item in the list; other items pass through
    ///
    /// Returns items in arbitrary completion grouping; the aggregator is
    /// responsible for order-sensitive presentation.
    pub async fn acquire_all(&self, batch_id: Uuid, items: Vec<WorkItem>) -> Vec<WorkItem> {
        let (eligible, mut passthrough): (Vec<WorkItem>, Vec<WorkItem>) = items
            .into_iter()
            .partition(|item| item.state == ItemState::Valid);

        let total = eligible.len();
        let completed = Arc::new(AtomicUsize::new(0));

        tracing::info!(batch_id = %batch_id, total, "Starting acquisition");

        let mut acquired: Vec<WorkItem> = Vec::with_capacity(total);
        let mut queue = eligible;

        while !queue.is_empty() {
            let batch: Vec<WorkItem> = queue
                .drain(..self.batch_width.min(queue.len()))
                .collect();

            let futures = batch.into_iter().map(|item| {
                let completed = Arc::clone(&completed);
                async move { self.acquire_one(batch_id, item, total, completed).await }
            });

            acquired.extend(join_all(futures).await);
        }

        passthrough.append(&mut acquired);
        passthrough
    }

    async fn acquire_one(
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
            format!("Downloading item {} of {}", item.index + 1, total),
            item.url.clone(),
            false,
        );

        let Some(description) = item.descriptive.clone() else {
            // Valid items always carry a description; guard anyway
            item.mark_failed("Missing descriptive metadata after validation");
            return self.finish_one(batch_id, item, total, completed);
        };

        item.state = ItemState::Acquiring;
        let output_path = self.output_path_for(&item);

        if let Err(e) = self.extractor.fetch_audio(&item.url, &output_path).await {
            tracing::warn!(url = %item.url, error = %e, "Audio extraction failed");
            item.mark_failed(e.to_string());
            return self.finish_one(batch_id, item, total, completed);
        }

        // Some collaborators report success without producing output; the
        // missing file is its own failure, distinct from a transport error
        match tokio::fs::metadata(&output_path).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                item.mark_failed("Extractor produced an empty output file");
                return self.finish_one(batch_id, item, total, completed);
            }
            Err(_) => {
                item.mark_failed("Failed to create output file");
                return self.finish_one(batch_id, item, total, completed);
            }
        }

        let cover = self.fetch_thumbnail(&description).await;

        // Reconciled catalog metadata supersedes the noisy source metadata;
        // a declined match falls back to what validation captured
        let reconciled = self
            .matcher
            .reconcile(&description.author, &description.title)
            .await;

        let tags = match &reconciled {
            Some(candidate) => {
                item.reconciled = Some(ReconciledMetadata {
                    title: candidate.title.clone(),
                    artist: candidate.artist.clone(),
                    album: candidate.album.clone(),
                    year: candidate.year.clone(),
                    recording_id: candidate.recording_id.clone(),
                });
                TagSet {
                    title: candidate.title.clone(),
                    artist: candidate.artist.clone(),
                    album: candidate.album.clone(),
                    year: candidate.year.clone(),
                    cover,
                }
            }
            None => TagSet {
                title: description.title.clone(),
                artist: description.author.clone(),
                album: self.album_label.clone(),
                year: None,
                cover,
            },
        };

        item.state = ItemState::Tagging;
        if let Err(e) = self.tag_sink.write(&output_path, &tags) {
            // The audio is already on disk; a failed tag write downgrades
            // to a warning instead of reverting the acquisition
            tracing::warn!(url = %item.url, error = %e, "Tag write failed");
            item.warning = Some(format!("Tag write failed for {}: {}", item.url, e));
        }

        item.mark_done(output_path);
        self.finish_one(batch_id, item, total, completed)
    }

    fn finish_one(
        &self,
        batch_id: Uuid,
        item: WorkItem,
        total: usize,
        completed: Arc<AtomicUsize>,
    ) -> WorkItem {
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        let is_complete = done == total;
        let status = if is_complete {
            "Download complete!".to_string()
        } else {
            format!("Downloaded {} of {}", done, total)
        };
        self.emit_progress(batch_id, done, total, status, item.url.clone(), is_complete);
        item
    }

    /// Distinct per-item output file inside the shared temp directory
    fn output_path_for(&self, item: &WorkItem) -> PathBuf {
        let key = extractor::item_key(&item.url).unwrap_or_else(|| format!("item-{}", item.index));
        self.temp_dir.join(format!("{}.mp3", key))
    }

    /// Best-effort thumbnail download; failure means "no cover image"
    async fn fetch_thumbnail(&self, description: &SourceDescription) -> Option<CoverImage> {
        let thumbnail_url = description.thumbnail_url.as_deref()?;

        let response = match self
            .http
            .get(thumbnail_url)
            .header(reqwest::header::USER_AGENT, THUMBNAIL_USER_AGENT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(
                    url = %thumbnail_url,
                    status = %response.status(),
                    "Thumbnail fetch rejected, continuing without cover"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    url = %thumbnail_url,
                    error = %e,
                    "Thumbnail fetch failed, continuing without cover"
                );
                return None;
            }
        };

        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => Some(CoverImage::jpeg(bytes.to_vec())),
            _ => None,
        }
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
        self.events.emit(PipelineEvent::AcquisitionProgress {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extractor::ExtractorError;
    use crate::services::musicbrainz_client::{
        MBArtistCredit, MBError, MBRecording, MBReleaseDetail, RecordingCatalog,
    };
    use crate::services::tag_writer::{TagError, TagWriter};
    use async_trait::async_trait;
    use id3::TagLike;
    use std::path::Path;

    /// Extractor stub controlling the download outcome per URL marker
    struct StubExtractor;

    #[async_trait]
    impl MediaExtractor for StubExtractor {
        async fn describe(&self, _url: &str) -> Result<SourceDescription, ExtractorError> {
            unreachable!("acquisition uses metadata captured at validation");
        }

        async fn fetch_audio(&self, url: &str, output: &Path) -> Result<(), ExtractorError> {
            if url.contains("neterr") {
                return Err(ExtractorError::DownloadFailed(
                    "connection reset".to_string(),
                ));
            }
            if url.contains("ghost") {
                // Reports success without producing a file
                return Ok(());
            }
            if url.contains("empty") {
                tokio::fs::write(output, b"").await?;
                return Ok(());
            }
            tokio::fs::write(output, b"fake mp3 payload").await?;
            Ok(())
        }
    }

    /// Catalog stub: a fixed accepted match, or nothing
    struct StubCatalog {
        accept: bool,
    }

    #[async_trait]
    impl RecordingCatalog for StubCatalog {
        async fn search_recording(
            &self,
            track: &str,
            artist: &str,
        ) -> Result<Option<MBRecording>, MBError> {
            if !self.accept {
                return Ok(None);
            }
            Ok(Some(MBRecording {
                id: "rec-1".to_string(),
                title: track.to_string(),
                length: None,
                artist_credit: vec![MBArtistCredit {
                    name: artist.to_string(),
                    artist: None,
                }],
                releases: Some(vec![crate::services::musicbrainz_client::MBRelease {
                    id: "rel-1".to_string(),
                    title: "Discovery".to_string(),
                    date: Some("2001-03-12".to_string()),
                }]),
            }))
        }

        async fn lookup_release(&self, _release_id: &str) -> Result<MBReleaseDetail, MBError> {
            Ok(MBReleaseDetail {
                id: "rel-1".to_string(),
                title: "Discovery".to_string(),
                date: Some("2001-03-12".to_string()),
            })
        }
    }

    /// Tag sink that always refuses
    struct FailingTagSink;

    impl TagSink for FailingTagSink {
        fn write(&self, _path: &Path, _tags: &TagSet) -> Result<(), TagError> {
            Err(TagError::Write(id3::Error::new(
                id3::ErrorKind::InvalidInput,
                "refused",
            )))
        }
    }

    fn stage(temp_dir: &Path, accept_match: bool) -> AcquisitionStage {
        stage_with_sink(temp_dir, accept_match, Arc::new(TagWriter::new()))
    }

    fn stage_with_sink(
        temp_dir: &Path,
        accept_match: bool,
        tag_sink: Arc<dyn TagSink>,
    ) -> AcquisitionStage {
        AcquisitionStage::new(
            Arc::new(StubExtractor),
            CatalogMatcher::new(Arc::new(StubCatalog {
                accept: accept_match,
            })),
            tag_sink,
            EventBus::new(256),
            temp_dir.to_path_buf(),
            5,
            "Tunebatch Downloads".to_string(),
        )
    }

    fn valid_item(url: &str, index: usize, title: &str, author: &str) -> WorkItem {
        let mut item = WorkItem::new(url, index);
        item.mark_valid(SourceDescription {
            title: title.to_string(),
            author: author.to_string(),
            thumbnail_url: None,
            duration_seconds: 180.0,
        });
        item
    }

    #[tokio::test]
    async fn test_successful_acquisition_tags_with_fallback_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), false);

        let items = vec![valid_item(
            "https://www.youtube.com/watch?v=ok1",
            0,
            "Some Unparseable Upload",
            "Some Channel",
        )];

        let result = stage.acquire_all(Uuid::new_v4(), items).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].state, ItemState::Done);
        assert!(result[0].reconciled.is_none());

        let artifact = result[0].artifact_path.as_ref().unwrap();
        assert!(artifact.exists());

        let tag = id3::Tag::read_from_path(artifact).unwrap();
        assert_eq!(tag.title(), Some("Some Unparseable Upload"));
        assert_eq!(tag.artist(), Some("Some Channel"));
        assert_eq!(tag.album(), Some("Tunebatch Downloads"));
    }

    #[tokio::test]
    async fn test_accepted_match_supersedes_source_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), true);

        let items = vec![valid_item(
            "https://www.youtube.com/watch?v=ok1",
            0,
            "Daft Punk - One More Time (Official Video)",
            "Daft Punk",
        )];

        let result = stage.acquire_all(Uuid::new_v4(), items).await;
        assert_eq!(result[0].state, ItemState::Done);

        let reconciled = result[0].reconciled.as_ref().expect("match accepted");
        assert_eq!(reconciled.title, "One More Time");
        assert_eq!(reconciled.album, "Discovery");
        assert_eq!(reconciled.year.as_deref(), Some("2001"));

        let tag = id3::Tag::read_from_path(result[0].artifact_path.as_ref().unwrap()).unwrap();
        assert_eq!(tag.title(), Some("One More Time"));
        assert_eq!(tag.artist(), Some("Daft Punk"));
        assert_eq!(tag.album(), Some("Discovery"));
        assert_eq!(tag.year(), Some(2001));
    }

    #[tokio::test]
    async fn test_download_failure_does_not_cancel_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), false);

        let items = vec![
            valid_item("https://www.youtube.com/watch?v=ok1", 0, "A - B", "A"),
            valid_item("https://www.youtube.com/watch?v=neterr", 1, "C - D", "C"),
            valid_item("https://www.youtube.com/watch?v=ok2", 2, "E - F", "E"),
        ];

        let mut result = stage.acquire_all(Uuid::new_v4(), items).await;
        result.sort_by_key(|item| item.index);

        assert_eq!(result[0].state, ItemState::Done);
        assert_eq!(result[1].state, ItemState::Failed);
        assert!(result[1]
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("connection reset"));
        assert_eq!(result[2].state, ItemState::Done);
    }

    #[tokio::test]
    async fn test_reported_success_without_output_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), false);

        let items = vec![valid_item(
            "https://www.youtube.com/watch?v=ghost",
            0,
            "A - B",
            "A",
        )];

        let result = stage.acquire_all(Uuid::new_v4(), items).await;
        assert_eq!(result[0].state, ItemState::Failed);
        assert_eq!(
            result[0].failure_reason.as_deref(),
            Some("Failed to create output file")
        );
    }

    #[tokio::test]
    async fn test_empty_output_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), false);

        let items = vec![valid_item(
            "https://www.youtube.com/watch?v=empty",
            0,
            "A - B",
            "A",
        )];

        let result = stage.acquire_all(Uuid::new_v4(), items).await;
        assert_eq!(result[0].state, ItemState::Failed);
        assert_eq!(
            result[0].failure_reason.as_deref(),
            Some("Extractor produced an empty output file")
        );
    }

    #[tokio::test]
    async fn test_tag_write_failure_downgrades_to_warning() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage_with_sink(dir.path(), false, Arc::new(FailingTagSink));

        let items = vec![valid_item(
            "https://www.youtube.com/watch?v=ok1",
            0,
            "A - B",
            "A",
        )];

        let result = stage.acquire_all(Uuid::new_v4(), items).await;
        assert_eq!(result[0].state, ItemState::Done);
        assert!(result[0].artifact_path.is_some());
        assert!(result[0]
            .warning
            .as_deref()
            .unwrap()
            .contains("Tag write failed"));
    }

    #[tokio::test]
    async fn test_invalid_items_pass_through_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), false);

        let mut invalid = WorkItem::new("https://www.youtube.com/watch?v=nope", 0);
        invalid.mark_invalid("Video unavailable");

        let result = stage.acquire_all(Uuid::new_v4(), vec![invalid]).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].state, ItemState::Invalid);
        assert!(result[0].artifact_path.is_none());
    }
}
