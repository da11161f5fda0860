//! exif_metadata - photo/video metadata normalization
//!
//! Turns the flat tag bag an extraction tool (ExifTool, or kamadak-exif as a
//! fallback) reports for one file into display resolution, UTC capture time
//! and GPS location. Each field resolves independently; only content that
//! can't be classified as photo or video fails outright.

mod error;
mod raw;
mod classify;
mod schema;
mod location;
mod resolution;
mod timestamp;
mod size;
mod mime;
mod source;
mod extract;
mod assemble;
pub mod pipeline;
pub mod metrics;
pub mod organ;

pub use error::{MetadataError, ParseError, ResolveError, Result};
pub use raw::{RawMetadata, RawValue};
pub use classify::{classify, ContentClass};
pub use schema::{schema_for, DateLayout, MetadataKeySchema, PHOTO_SCHEMA, VIDEO_SCHEMA};
pub use location::{parse_position, Location};
pub use resolution::{resolve_resolution, Resolution};
pub use timestamp::{resolve_timestamp, ResolvedTimestamp, TimestampOutcome, TimezoneLookup, TzfLookup};
pub use size::readable_size;
pub use mime::{DetectedType, InferDetector, MimeDetector};
pub use source::{ByteSource, FileSource, MemorySource, SourceContent};
pub use extract::{exiftool_available, ExifTool, FallbackExtractor, KamadakExif, MetadataExtractor};
pub use assemble::{
    AssemblerConfig, Field, FieldIssue, IssueRecord, MetadataAssembler, MetadataRecord,
    StructuredMetadata, UnknownContentPolicy,
};
