//! Title parsing for catalog reconciliation
//!
//! Media-source titles are human-authored and noisy ("Artist - Track
//! (Official Video) [HD]"). This module extracts a candidate (artist, track)
//! pair using an ordered table of pure rules; the first structural match
//! wins. When no rule matches, extraction reports unparseable rather than
//! guessing; callers treat that as "no catalog lookup attempted", never as
//! an error.

/// Candidate (artist, track) pair extracted from a raw title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistTrack {
    pub artist: String,
    pub track: String,
}

/// Pattern rules, evaluated in fixed priority order
const RULES: &[fn(&str) -> Option<ArtistTrack>] = &[
    rule_hyphen_separated,
    rule_quoted_track,
    rule_track_by_artist,
    rule_colon_separated,
];

/// Fallback literal separators, tried in order after the pattern rules
const FALLBACK_SEPARATORS: &[&str] = &[" - ", " | ", " ~ ", " \u{2014} "];

/// Extract a candidate (artist, track) pair from a raw source title
///
/// Noise segments (parenthesized, bracketed, braced) are stripped before
/// rule evaluation; trailing `|`/`~` noise not consumed by a rule is
/// stripped from the track part afterwards.
pub fn extract(raw_title: &str) -> Option<ArtistTrack> {
    let cleaned = scrub_noise(raw_title);
    if cleaned.is_empty() {
        return None;
    }

    for rule in RULES {
        if let Some(pair) = rule(&cleaned).and_then(finish) {
            return Some(pair);
        }
    }

    // No pattern matched; try the literal separators, joining any remainder
    // back into the track
    for separator in FALLBACK_SEPARATORS {
        if let Some((artist, track)) = cleaned.split_once(separator) {
            let candidate = ArtistTrack {
                artist: artist.trim().to_string(),
                track: track.trim().to_string(),
            };
            if let Some(pair) = finish(candidate) {
                return Some(pair);
            }
        }
    }

    None
}

/// `Artist - Track`: hyphen-separated prefix/suffix
fn rule_hyphen_separated(title: &str) -> Option<ArtistTrack> {
    let (artist, track) = title.split_once('-')?;
    Some(ArtistTrack {
        artist: artist.trim().to_string(),
        track: track.trim().to_string(),
    })
}

/// `Artist "Track"`: quoted track, double or single quotes
fn rule_quoted_track(title: &str) -> Option<ArtistTrack> {
    let open = title.find(['"', '\''])?;
    let artist = &title[..open];
    let rest = &title[open + 1..];
    let close = rest.find(['"', '\''])?;
    Some(ArtistTrack {
        artist: artist.trim().to_string(),
        track: rest[..close].trim().to_string(),
    })
}

/// `Track by Artist`, case-insensitive
fn rule_track_by_artist(title: &str) -> Option<ArtistTrack> {
    let lower = title.to_lowercase();
    let at = lower.find(" by ")?;
    Some(ArtistTrack {
        artist: title[at + 4..].trim().to_string(),
        track: title[..at].trim().to_string(),
    })
}

/// `Artist: Track`
fn rule_colon_separated(title: &str) -> Option<ArtistTrack> {
    let (artist, track) = title.split_once(':')?;
    Some(ArtistTrack {
        artist: artist.trim().to_string(),
        track: track.trim().to_string(),
    })
}

/// Remove parenthesized, bracketed and braced segments, collapse whitespace
fn scrub_noise(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    let mut depth_paren = 0usize;
    let mut depth_bracket = 0usize;
    let mut depth_brace = 0usize;

    for ch in title.chars() {
        match ch {
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.saturating_sub(1),
            '[' => depth_bracket += 1,
            ']' => depth_bracket = depth_bracket.saturating_sub(1),
            '{' => depth_brace += 1,
            '}' => depth_brace = depth_brace.saturating_sub(1),
            _ if depth_paren == 0 && depth_bracket == 0 && depth_brace == 0 => cleaned.push(ch),
            _ => {}
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip trailing `|`/`~` noise from the track and reject empty halves
fn finish(pair: ArtistTrack) -> Option<ArtistTrack> {
    let track = match pair.track.find(['|', '~']) {
        Some(at) => pair.track[..at].trim().to_string(),
        None => pair.track,
    };

    if pair.artist.is_empty() || track.is_empty() {
        return None;
    }

    Some(ArtistTrack {
        artist: pair.artist,
        track,
    })
}
