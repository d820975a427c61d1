//! Service modules for the acquisition pipeline
//!
//! Collaborator boundaries (extractor, catalog, tag writer, archive builder)
//! and the pure reconciliation services they feed.

pub mod archive_builder;
pub mod catalog_matcher;
pub mod extractor;
pub mod musicbrainz_client;
pub mod tag_writer;
pub mod title_parser;

pub use archive_builder::{ArchiveBuilder, ArchiveEntry, ArchiveError};
pub use catalog_matcher::CatalogMatcher;
pub use extractor::{ExtractorError, MediaExtractor, YtDlpExtractor};
pub use musicbrainz_client::{MBError, MusicBrainzClient, RecordingCatalog};
pub use tag_writer::{CoverImage, TagError, TagSet, TagSink, TagWriter};
pub use title_parser::ArtistTrack;
