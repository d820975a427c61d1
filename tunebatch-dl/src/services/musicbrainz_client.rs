//! MusicBrainz API client
//!
//! Catalog collaborator for metadata reconciliation. The service is
//! rate-limited (1 request/second) and every call carries a bounded timeout;
//! callers identify themselves with a stable User-Agent string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = "tunebatch/0.1.0 ( https://github.com/tunebatch/tunebatch )";
const RATE_LIMIT_MS: u64 = 1000; // 1 request per second
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Recording search response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct MBRecordingSearch {
    #[serde(default)]
    pub recordings: Vec<MBRecording>,
}

/// MusicBrainz Recording
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRecording {
    /// Recording MBID (MusicBrainz ID)
    pub id: String,
    /// Recording title
    pub title: String,
    /// Recording length in milliseconds
    pub length: Option<u64>,
    /// Artist credits for this recording
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
    /// Releases containing this recording
    pub releases: Option<Vec<MBRelease>>,
}

impl MBRecording {
    /// Display name of the primary credited artist, if any
    pub fn primary_artist(&self) -> Option<&str> {
        self.artist_credit.first().map(|credit| credit.name.as_str())
    }
}

/// MusicBrainz artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistCredit {
    /// Display name (may differ from artist.name for collaborations)
    pub name: String,
    /// Artist information
    pub artist: Option<MBArtist>,
}

/// MusicBrainz artist
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtist {
    /// Artist MBID (MusicBrainz ID)
    pub id: String,
    /// Artist name
    pub name: String,
}

/// MusicBrainz release as embedded in recording results
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRelease {
    /// Release MBID (MusicBrainz ID)
    pub id: String,
    /// Release title
    pub title: String,
    /// Release date in YYYY-MM-DD format
    pub date: Option<String>,
}

/// Full release lookup response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBReleaseDetail {
    /// Release MBID (MusicBrainz ID)
    pub id: String,
    /// Release title
    pub title: String,
    /// Release date in YYYY-MM-DD format
    pub date: Option<String>,
}

impl MBReleaseDetail {
    /// Release year parsed from the date field
    pub fn year(&self) -> Option<String> {
        self.date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .filter(|year| year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }
}

/// Catalog lookup seam consumed by the matcher
///
/// Production traffic goes to MusicBrainz; tests substitute a stub.
#[async_trait]
pub trait RecordingCatalog: Send + Sync {
    /// Exact-phrase search for one recording, limited to the top result
    async fn search_recording(
        &self,
        track: &str,
        artist: &str,
    ) -> Result<Option<MBRecording>, MBError>;

    /// Fetch release details (album title, date) for a release MBID
    async fn lookup_release(&self, release_id: &str) -> Result<MBReleaseDetail, MBError>;
}

/// Build the conjunctive exact-phrase search query
pub fn build_recording_query(track: &str, artist: &str) -> String {
    format!("recording:\"{}\" AND artist:\"{}\"", track, artist)
}

/// Rate limiter enforcing 1 request/second
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, MBError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, MBError> {
        // Rate limit
        self.rate_limiter.wait().await;

        tracing::debug!(url = %url, "Querying MusicBrainz API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 503 {
            return Err(MBError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| MBError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl RecordingCatalog for MusicBrainzClient {
    async fn search_recording(
        &self,
        track: &str,
        artist: &str,
    ) -> Result<Option<MBRecording>, MBError> {
        let query = build_recording_query(track, artist);
        let url = format!(
            "{}/recording/?query={}&fmt=json&limit=1",
            MUSICBRAINZ_BASE_URL,
            urlencode(&query)
        );

        let search: MBRecordingSearch = self.get_json(&url).await?;
        let recording = search.recordings.into_iter().next();

        if let Some(recording) = &recording {
            tracing::info!(
                mbid = %recording.id,
                title = %recording.title,
                artist = %recording.primary_artist().unwrap_or("Unknown"),
                "Retrieved recording from MusicBrainz"
            );
        } else {
            tracing::debug!(track = %track, artist = %artist, "No exact match in MusicBrainz");
        }

        Ok(recording)
    }

    async fn lookup_release(&self, release_id: &str) -> Result<MBReleaseDetail, MBError> {
        let url = format!("{}/release/{}?fmt=json", MUSICBRAINZ_BASE_URL, release_id);
        self.get_json(&url).await
    }
}

/// Percent-encode a query component
fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
