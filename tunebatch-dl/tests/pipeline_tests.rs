//! End-to-end pipeline tests against stub collaborators
//!
//! Exercises the full validate → acquire → report path with the extractor
//! and catalog replaced by deterministic stubs. No network, no external
//! tools.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tunebatch_dl::pipeline::BatchOrchestrator;
use tunebatch_dl::services::extractor::{ExtractorError, MediaExtractor};
use tunebatch_dl::services::musicbrainz_client::{MBError, MBRecording, RecordingCatalog};
use tunebatch_dl::services::tag_writer::TagWriter;
use tunebatch_dl::types::{ItemState, SourceDescription};
use tunebatch_dl::{PipelineConfig, PipelineEvent};

/// Deterministic extractor stub driven by URL markers:
/// - "badmeta" URLs fail validation
/// - "neterr" URLs fail the download
/// - everything else succeeds and writes a fake payload
struct ScriptedExtractor;

#[async_trait]
impl MediaExtractor for ScriptedExtractor {
    async fn describe(&self, url: &str) -> Result<SourceDescription, ExtractorError> {
        if url.contains("badmeta") {
            return Err(ExtractorError::DescribeFailed(
                "Video unavailable".to_string(),
            ));
        }
        Ok(SourceDescription {
            title: format!("Artist - Track {}", url.len()),
            author: "Artist".to_string(),
            thumbnail_url: None,
            duration_seconds: 180.0,
        })
    }

    async fn fetch_audio(&self, url: &str, output: &Path) -> Result<(), ExtractorError> {
        if url.contains("neterr") {
            return Err(ExtractorError::DownloadFailed(
                "connection reset".to_string(),
            ));
        }
        tokio::fs::write(output, b"fake mp3 payload").await?;
        Ok(())
    }
}

/// Catalog stub that never finds a match
struct SilentCatalog;

#[async_trait]
impl RecordingCatalog for SilentCatalog {
    async fn search_recording(
        &self,
        _track: &str,
        _artist: &str,
    ) -> Result<Option<MBRecording>, MBError> {
        Ok(None)
    }

    async fn lookup_release(
        &self,
        _release_id: &str,
    ) -> Result<tunebatch_dl::services::musicbrainz_client::MBReleaseDetail, MBError> {
        Err(MBError::NetworkError("no such release".to_string()))
    }
}

struct Fixture {
    orchestrator: BatchOrchestrator,
    _temp: tempfile::TempDir,
    _out: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let config = PipelineConfig {
        temp_dir: temp.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        batch_width: 2,
        album_label: "Tunebatch Downloads".to_string(),
    };

    let orchestrator = BatchOrchestrator::new(
        config,
        Arc::new(ScriptedExtractor),
        Arc::new(SilentCatalog),
        Arc::new(TagWriter::new()),
    )
    .unwrap();

    Fixture {
        orchestrator,
        _temp: temp,
        _out: out,
    }
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

#[tokio::test]
async fn test_validate_batch_preserves_length_and_order() {
    let fixture = fixture();
    let urls: Vec<String> = (0..7).map(|i| watch_url(&format!("vid{}", i))).collect();

    let items = fixture.orchestrator.validate_batch(&urls).await;

    assert_eq!(items.len(), urls.len());
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item.index, i);
        assert_eq!(item.url, urls[i]);
    }
}

#[tokio::test]
async fn test_every_item_reaches_exactly_one_terminal_bucket() {
    let fixture = fixture();
    let urls = vec![
        watch_url("ok1"),
        watch_url("badmeta1"),
        watch_url("neterr1"),
        watch_url("ok2"),
        "garbage input".to_string(),
    ];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    let report = fixture.orchestrator.run_batch(items).await;

    // success + failure counts sum to input length
    assert_eq!(report.successful + report.failed, urls.len());
    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 3);
    assert_eq!(report.failures.len(), 3);
}

#[tokio::test]
async fn test_end_to_end_three_urls_one_validation_failure() {
    let fixture = fixture();
    let urls = vec![watch_url("ok1"), watch_url("badmeta"), watch_url("ok2")];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    assert_eq!(items[0].state, ItemState::Valid);
    assert_eq!(items[1].state, ItemState::Invalid);
    assert_eq!(items[2].state, ItemState::Valid);

    let report = fixture.orchestrator.run_batch(items).await;

    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].url, urls[1]);
    assert!(report.failures[0].error.contains("Video unavailable"));

    // The archive contains exactly the two successful items
    let archive_path = report.archive_path.expect("archive built");
    let archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn test_zero_successes_yields_no_archive() {
    let fixture = fixture();
    let urls = vec![watch_url("badmeta1"), watch_url("neterr1")];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    let report = fixture.orchestrator.run_batch(items).await;

    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 2);
    assert!(report.archive_path.is_none());
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let fixture = fixture();
    let urls = vec![watch_url("ok1")];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    let _report = fixture.orchestrator.run_batch(items).await;

    fixture.orchestrator.cleanup().await.unwrap();
    // Second pass over an already-empty temp area must not error
    fixture.orchestrator.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_acquisition_failures_listed_before_validation_failures() {
    let fixture = fixture();
    // Validation failure arrives first in the input, but acquisition
    // failures lead the report
    let urls = vec![watch_url("badmeta"), watch_url("neterr"), watch_url("ok1")];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    let report = fixture.orchestrator.run_batch(items).await;

    assert_eq!(report.failures.len(), 2);
    assert!(report.failures[0].error.contains("connection reset"));
    assert!(report.failures[1].error.contains("Video unavailable"));
}

#[tokio::test]
async fn test_progress_stream_reports_both_stages_and_completion() {
    let fixture = fixture();
    let mut subscription = fixture.orchestrator.subscribe();
    let urls = vec![watch_url("ok1"), watch_url("ok2")];

    let items = fixture.orchestrator.validate_batch(&urls).await;
    let report = fixture.orchestrator.run_batch(items).await;
    assert_eq!(report.successful, 2);

    let mut saw_validation_complete = false;
    let mut saw_acquisition_complete = false;
    let mut saw_batch_completed = false;

    while let Some(event) = subscription.recv().await {
        match event {
            PipelineEvent::ValidationProgress { is_complete, .. } if is_complete => {
                saw_validation_complete = true;
            }
            PipelineEvent::AcquisitionProgress { is_complete, .. } if is_complete => {
                saw_acquisition_complete = true;
            }
            PipelineEvent::BatchCompleted {
                successful, failed, ..
            } => {
                assert_eq!(successful, 2);
                assert_eq!(failed, 0);
                saw_batch_completed = true;
                break;
            }
            _ => {}
        }
    }

    assert!(saw_validation_complete);
    assert!(saw_acquisition_complete);
    assert!(saw_batch_completed);
}

#[tokio::test]
async fn test_artifacts_are_tagged_before_packaging() {
    let temp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let config = PipelineConfig {
        temp_dir: temp.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        batch_width: 2,
        album_label: "Custom Album".to_string(),
    };

    let orchestrator = BatchOrchestrator::new(
        config,
        Arc::new(ScriptedExtractor),
        Arc::new(SilentCatalog),
        Arc::new(TagWriter::new()),
    )
    .unwrap();

    let urls = vec![watch_url("ok1")];
    let items = orchestrator.validate_batch(&urls).await;
    let report = orchestrator.run_batch(items).await;
    assert_eq!(report.successful, 1);

    // The archived copy carries the fallback album label
    let archive_path = report.archive_path.expect("archive built");
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let mut entry = archive.by_index(0).unwrap();
    let mut bytes = Vec::new();
    std::io::copy(&mut entry, &mut bytes).unwrap();

    let unpacked = out.path().join("unpacked.mp3");
    std::fs::write(&unpacked, &bytes).unwrap();

    let tag = id3::Tag::read_from_path(&unpacked).unwrap();
    use id3::TagLike;
    assert_eq!(tag.album(), Some("Custom Album"));
    assert_eq!(tag.artist(), Some("Artist"));
}
