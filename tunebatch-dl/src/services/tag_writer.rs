//! Embedded metadata writing
//!
//! Mutates a downloaded file's ID3v2 tag in place: title, artist, album,
//! optional year and front-cover image. The audio content itself is never
//! touched.

use id3::frame::{Content, Frame, Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::Path;
use thiserror::Error;

/// Tag writer errors
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Tag write failed: {0}")]
    Write(#[from] id3::Error),
}

/// Cover image bytes with their MIME type
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CoverImage {
    /// JPEG cover image (the thumbnail format the sources serve)
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

/// Tag set applied to one file
#[derive(Debug, Clone)]
pub struct TagSet {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub cover: Option<CoverImage>,
}

/// Tag-writing seam consumed by the acquisition stage
///
/// Production writes ID3v2 frames; tests substitute a stub to exercise the
/// write-failure leniency path.
pub trait TagSink: Send + Sync {
    /// Write the tag set to the file at `path`
    fn write(&self, path: &Path, tags: &TagSet) -> Result<(), TagError>;
}

/// ID3v2 tag writer
pub struct TagWriter;

impl TagWriter {
    pub fn new() -> Self {
        Self
    }
}

impl TagSink for TagWriter {
    fn write(&self, path: &Path, tags: &TagSet) -> Result<(), TagError> {
        let mut tag = Tag::new();
        tag.set_title(&tags.title);
        tag.set_artist(&tags.artist);
        tag.set_album(&tags.album);

        if let Some(year) = tags.year.as_deref().and_then(|y| y.parse::<i32>().ok()) {
            tag.set_year(year);
        }

        if let Some(cover) = &tags.cover {
            let picture = Picture {
                mime_type: cover.mime_type.clone(),
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data: cover.data.clone(),
            };
            tag.add_frame(Frame::with_content("APIC", Content::Picture(picture)));
        }

        tag.write_to_path(path, Version::Id3v24)?;

        tracing::debug!(
            path = %path.display(),
            title = %tags.title,
            artist = %tags.artist,
            album = %tags.album,
            "Wrote embedded metadata"
        );

        Ok(())
    }
}

impl Default for TagWriter {
    fn default() -> Self {
        Self::new()
    }
}
