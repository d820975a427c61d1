//! Media extractor collaborator boundary
//!
//! The extractor answers two questions about a source URL: "what is this?"
//! (descriptive metadata for validation) and "give me the audio" (extraction
//! to a local file for acquisition). Production uses the `yt-dlp` external
//! tool; tests substitute stubs behind the [`MediaExtractor`] trait.

use crate::types::SourceDescription;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use url::Url;

/// Extractor errors
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("yt-dlp executable not found on PATH")]
    ToolNotFound,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch media info: {0}")]
    DescribeFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Media extractor collaborator
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve a URL to its descriptive metadata without downloading
    async fn describe(&self, url: &str) -> Result<SourceDescription, ExtractorError>;

    /// Extract the audio stream to a local file at `output_path`
    ///
    /// A successful return means the tool reported success; callers still
    /// verify the output file exists and is non-empty, since some sources
    /// report success without producing output.
    async fn fetch_audio(&self, url: &str, output_path: &Path) -> Result<(), ExtractorError>;
}

/// Metadata subset of yt-dlp's JSON dump
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

impl From<YtDlpInfo> for SourceDescription {
    fn from(info: YtDlpInfo) -> Self {
        SourceDescription {
            title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
            author: info.uploader.unwrap_or_else(|| "Unknown Author".to_string()),
            thumbnail_url: info.thumbnail.filter(|t| !t.is_empty()),
            duration_seconds: info.duration.unwrap_or(0.0),
        }
    }
}

/// `yt-dlp` subprocess extractor
pub struct YtDlpExtractor;

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Check that the external tool is installed
    pub fn check_available(&self) -> Result<(), ExtractorError> {
        which::which("yt-dlp")
            .map(|_| ())
            .map_err(|_| ExtractorError::ToolNotFound)
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn describe(&self, url: &str) -> Result<SourceDescription, ExtractorError> {
        tracing::debug!(url = %url, "Fetching media info with yt-dlp");

        let output = Command::new("yt-dlp")
            .arg("--dump-single-json")
            .arg("--no-download")
            .arg("--no-warnings")
            .arg("--no-check-certificates")
            .arg("--prefer-free-formats")
            .arg("--referer")
            .arg(url)
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractorError::DescribeFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractorError::DescribeFailed(e.to_string()))?;

        Ok(info.into())
    }

    async fn fetch_audio(&self, url: &str, output_path: &Path) -> Result<(), ExtractorError> {
        let output_str = output_path
            .to_str()
            .ok_or_else(|| ExtractorError::DownloadFailed("Invalid output path".to_string()))?;

        tracing::info!(url = %url, output = %output_str, "Starting audio extraction");

        let output = Command::new("yt-dlp")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("0")
            .arg("--no-warnings")
            .arg("--no-check-certificates")
            .arg("--prefer-free-formats")
            .arg("--referer")
            .arg(url)
            .arg("-o")
            .arg(output_str)
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractorError::DownloadFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(())
    }
}

/// Whether a URL looks like a supported watch page
///
/// Cheap structural pre-check run before any extractor call; the extractor
/// remains the authority on whether the item actually resolves.
pub fn is_watch_url(raw: &str) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match url.host_str() {
        Some(host) if host == "youtu.be" => url.path().len() > 1,
        Some(host) if host == "youtube.com" || host.ends_with(".youtube.com") => {
            url.path() == "/watch"
                && url
                    .query_pairs()
                    .any(|(key, value)| key == "v" && !value.is_empty())
        }
        _ => false,
    }
}

/// URL-derived identifier used to key per-item temp files
///
/// Extracts the watch id from `?v=` or a `youtu.be` path. Returns `None`
/// for URLs that carry no recognizable id; callers fall back to an
/// index-derived key so concurrent writers never collide.
pub fn item_key(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;

    if url.host_str() == Some("youtu.be") {
        let id = url.path().trim_start_matches('/');
        if !id.is_empty() {
            return Some(id.to_string());
        }
        return None;
    }

    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}
