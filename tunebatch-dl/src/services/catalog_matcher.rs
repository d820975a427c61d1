//! Catalog reconciliation with fuzzy-confidence gating
//!
//! Matches a noisy source title against the metadata catalog. The dual
//! acceptance gate (title similarity AND artist similarity at or above the
//! threshold) is deliberate: accepting on one field alone mis-tags items
//! whenever the same track title exists under a different artist, or vice
//! versa. Below the gate the matcher declines (a data-quality rejection,
//! not an error) and the caller keeps the raw source metadata.

use crate::services::musicbrainz_client::RecordingCatalog;
use crate::services::title_parser;
use crate::types::MatchCandidate;
use std::sync::Arc;

/// Minimum similarity score (0-1) on both fields to accept a match
const MIN_SIMILARITY_SCORE: f64 = 0.85;

/// Catalog matcher
pub struct CatalogMatcher {
    catalog: Arc<dyn RecordingCatalog>,
    min_similarity: f64,
}

impl CatalogMatcher {
    /// Create a matcher over the given catalog with the default gate
    pub fn new(catalog: Arc<dyn RecordingCatalog>) -> Self {
        Self {
            catalog,
            min_similarity: MIN_SIMILARITY_SCORE,
        }
    }

    /// Reconcile a raw (author, title) pair against the catalog
    ///
    /// Returns `None` when the title is unparseable (no catalog query is
    /// issued), when the catalog fails or has no exact match, or when the
    /// confidence gate rejects the candidate. Never returns an error:
    /// reconciliation failures must not fail the owning acquisition.
    pub async fn reconcile(&self, raw_artist: &str, raw_title: &str) -> Option<MatchCandidate> {
        // Unreliable input is not worth a rate-limited catalog query
        let Some(extracted) = title_parser::extract(raw_title) else {
            tracing::debug!(
                title = %raw_title,
                author = %raw_artist,
                "Could not reliably extract artist and track from title"
            );
            return None;
        };

        tracing::debug!(
            artist = %extracted.artist,
            track = %extracted.track,
            "Searching catalog for exact match"
        );

        let recording = match self
            .catalog
            .search_recording(&extracted.track, &extracted.artist)
            .await
        {
            Ok(Some(recording)) => recording,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Catalog query failed, skipping reconciliation");
                return None;
            }
        };

        let candidate_artist = recording
            .primary_artist()
            .unwrap_or(&extracted.artist)
            .to_string();

        let title_similarity = similarity(&recording.title, &extracted.track);
        let artist_similarity = similarity(&candidate_artist, &extracted.artist);

        tracing::debug!(
            title_similarity = format!("{:.1}%", title_similarity * 100.0),
            artist_similarity = format!("{:.1}%", artist_similarity * 100.0),
            "Match confidence"
        );

        if title_similarity < self.min_similarity || artist_similarity < self.min_similarity {
            tracing::debug!(
                mbid = %recording.id,
                "Match confidence too low, skipping"
            );
            return None;
        }

        // Best-effort release details; a failure here keeps the winning
        // title/artist and leaves album/year empty
        let (album, year) = match recording.releases.as_ref().and_then(|r| r.first()) {
            Some(release) => match self.catalog.lookup_release(&release.id).await {
                Ok(detail) => {
                    let year = detail.year();
                    (detail.title, year)
                }
                Err(e) => {
                    tracing::warn!(
                        release_id = %release.id,
                        error = %e,
                        "Release lookup failed, keeping match without album details"
                    );
                    (String::new(), None)
                }
            },
            None => (String::new(), None),
        };

        Some(MatchCandidate {
            title: recording.title,
            artist: candidate_artist,
            album,
            year,
            recording_id: recording.id,
            title_similarity,
            artist_similarity,
        })
    }
}

/// Case-insensitive string similarity, normalized 0-1, symmetric
fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::sorensen_dice(&a.to_lowercase(), &b.to_lowercase())
}
