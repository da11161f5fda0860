//! Structured metadata assembly
//!
//! Runs every resolver over one raw tag bag and reports each field
//! independently: a field that cannot be resolved is left out and the reason
//! is recorded in [`StructuredMetadata::issues`]. Only failing to classify the
//! content at all is fatal.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::classify::{classify, ContentClass};
use crate::error::{MetadataError, ResolveError, Result};
use crate::location::{parse_position, Location};
use crate::mime::{InferDetector, MimeDetector};
use crate::raw::RawMetadata;
use crate::resolution::{resolve_resolution, Resolution};
use crate::schema::{schema_for, MetadataKeySchema};
use crate::size::readable_size;
use crate::timestamp::{resolve_timestamp, ResolvedTimestamp, TimezoneLookup, TzfLookup};

// ============================================================================
// Configuration
// ============================================================================

/// What to do with content that is neither `image/*` nor `video/*`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownContentPolicy {
    /// Fail the item with [`MetadataError::UnsupportedContent`]
    #[default]
    Reject,
    /// Treat it as a video and use the video schema
    TreatAsVideo,
}

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub unknown_content: UnknownContentPolicy,
    /// Offset used to interpret wall-clock timestamps whose zone is unknown
    pub naive_offset: FixedOffset,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            unknown_content: UnknownContentPolicy::Reject,
            naive_offset: Utc.fix(),
        }
    }
}

// ============================================================================
// Output types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Resolution,
    Location,
    Timestamp,
}

/// A field-level or soft failure recorded during assembly
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub field: Field,
    pub error: ResolveError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredMetadata {
    pub content_type: ContentClass,
    pub mime_type: String,
    pub extension: String,
    pub human_size: String,
    pub resolution: Option<Resolution>,
    pub location: Option<Location>,
    pub timestamp: Option<ResolvedTimestamp>,
    pub issues: Vec<FieldIssue>,
}

impl StructuredMetadata {
    pub fn issue(&self, field: Field) -> Option<&ResolveError> {
        self.issues.iter().find(|i| i.field == field).map(|i| &i.error)
    }

    pub fn to_record(&self) -> MetadataRecord {
        MetadataRecord {
            content_type: self.content_type,
            extension: self.extension.clone(),
            size: self.human_size.clone(),
            resolution: self.resolution,
            time: self.timestamp.as_ref().map(|t| t.instant.timestamp()),
            time_has_zone: self.timestamp.as_ref().map(|t| t.has_explicit_timezone),
            time_zone: self.timestamp.as_ref().and_then(|t| t.zone.clone()),
            location: self.location,
            issues: self
                .issues
                .iter()
                .map(|i| IssueRecord {
                    field: i.field,
                    reason: i.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Serializable view handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(rename = "type")]
    pub content_type: ContentClass,
    pub extension: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// Unix epoch seconds, UTC
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_has_zone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<IssueRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub field: Field,
    pub reason: String,
}

// ============================================================================
// Assembler
// ============================================================================

/// Holds the collaborators; cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct MetadataAssembler {
    detector: Arc<dyn MimeDetector>,
    timezones: Arc<dyn TimezoneLookup>,
    config: AssemblerConfig,
}

impl MetadataAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            detector: Arc::new(InferDetector),
            timezones: Arc::new(TzfLookup),
            config,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn MimeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_timezones(mut self, timezones: Arc<dyn TimezoneLookup>) -> Self {
        self.timezones = timezones;
        self
    }

    /// Normalize one item.
    ///
    /// `content` only needs to be long enough for MIME sniffing; `file_size`
    /// is the full size of the item in bytes.
    pub fn assemble(
        &self,
        raw: &RawMetadata,
        content: &[u8],
        file_size: u64,
    ) -> Result<StructuredMetadata> {
        if content.is_empty() {
            return Err(MetadataError::EmptyContent);
        }
        let detected = self
            .detector
            .detect(content)
            .ok_or(MetadataError::UnknownMimeType)?;

        let content_type = match (classify(&detected.mime_type), self.config.unknown_content) {
            (Some(class), _) => class,
            (None, UnknownContentPolicy::TreatAsVideo) => {
                debug!("treating `{}` as video", detected.mime_type);
                ContentClass::Video
            }
            (None, UnknownContentPolicy::Reject) => {
                return Err(MetadataError::UnsupportedContent(detected.mime_type));
            }
        };
        let schema = schema_for(content_type);

        let mut issues = Vec::new();

        let resolution = resolve_resolution(raw, schema)
            .map_err(|e| record(&mut issues, Field::Resolution, e))
            .ok();

        let location = read_location(raw, schema)
            .map_err(|e| record(&mut issues, Field::Location, e))
            .ok();

        let timestamp = match resolve_timestamp(
            raw,
            schema,
            location.as_ref(),
            self.timezones.as_ref(),
            self.config.naive_offset,
        ) {
            Ok(outcome) => {
                if let Some(soft) = outcome.soft_error {
                    record(&mut issues, Field::Timestamp, soft);
                }
                Some(outcome.timestamp)
            }
            Err(e) => {
                record(&mut issues, Field::Timestamp, e);
                None
            }
        };

        Ok(StructuredMetadata {
            content_type,
            mime_type: detected.mime_type,
            extension: detected.extension,
            human_size: readable_size(file_size as f64),
            resolution,
            location,
            timestamp,
            issues,
        })
    }
}

impl Default for MetadataAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default())
    }
}

fn read_location(raw: &RawMetadata, schema: &MetadataKeySchema) -> std::result::Result<Location, ResolveError> {
    let position = raw
        .get_string(schema.gps_position)
        .ok_or(ResolveError::MissingTag(schema.gps_position))?;
    Ok(parse_position(&position)?)
}

fn record(issues: &mut Vec<FieldIssue>, field: Field, error: ResolveError) {
    debug!("couldn't resolve {:?}: {}", field, error);
    issues.push(FieldIssue { field, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const PDF: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3";

    struct NoZones;

    impl TimezoneLookup for NoZones {
        fn zone_for(&self, _latitude: f64, _longitude: f64) -> Option<Tz> {
            None
        }
    }

    fn photo_tags() -> RawMetadata {
        RawMetadata::new()
            .with("ImageWidth", "4000")
            .with("ImageHeight", "3000")
            .with("Orientation", "Rotate 90 CW")
            .with("GPSPosition", "23 deg 46' 12.00\" N, 90 deg 23' 26.00\" E")
            .with("DateTimeOriginal", "2023:05:01 10:15:00")
    }

    #[test]
    fn test_assemble_photo() {
        let meta = MetadataAssembler::default()
            .assemble(&photo_tags(), JPEG, 1536)
            .unwrap();

        assert_eq!(meta.content_type, ContentClass::Photo);
        assert_eq!(meta.extension, "jpg");
        assert_eq!(meta.human_size, "1.5 KB");
        assert_eq!(meta.resolution, Some(Resolution { width: 3000, height: 4000 }));

        let loc = meta.location.unwrap();
        assert!((loc.latitude() - 23.77).abs() < 0.01);
        assert!((loc.longitude() - 90.39).abs() < 0.01);

        let ts = meta.timestamp.unwrap();
        assert!(ts.has_explicit_timezone);
        assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 4, 15, 0).unwrap());
        assert!(meta.issues.is_empty());
    }

    #[test]
    fn test_missing_time_keeps_other_fields() {
        let raw = RawMetadata::new()
            .with("ImageWidth", 640)
            .with("ImageHeight", 480);
        let meta = MetadataAssembler::default().assemble(&raw, JPEG, 10).unwrap();

        assert!(meta.timestamp.is_none());
        assert_eq!(meta.resolution, Some(Resolution { width: 640, height: 480 }));
        assert_eq!(meta.issue(Field::Timestamp), Some(&ResolveError::TimeNotFound));
        assert_eq!(meta.issue(Field::Location), Some(&ResolveError::MissingTag("GPSPosition")));
        assert_eq!(meta.issue(Field::Resolution), None);
    }

    #[test]
    fn test_bad_location_is_field_level() {
        let raw = photo_tags().with("GPSPosition", "95 deg 0' 0.00\" N, 10 deg 0' 0.00\" E");
        let meta = MetadataAssembler::default().assemble(&raw, JPEG, 10).unwrap();

        assert!(meta.location.is_none());
        assert!(matches!(
            meta.issue(Field::Location),
            Some(ResolveError::Location(ParseError::InvalidCoordinates { .. }))
        ));
        // no location, so the naive time stays naive
        let ts = meta.timestamp.unwrap();
        assert!(!ts.has_explicit_timezone);
        assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_zone_not_found_is_reported() {
        let meta = MetadataAssembler::default()
            .with_timezones(Arc::new(NoZones))
            .assemble(&photo_tags(), JPEG, 10)
            .unwrap();

        let ts = meta.timestamp.as_ref().unwrap();
        assert!(!ts.has_explicit_timezone);
        assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 10, 15, 0).unwrap());
        assert!(matches!(
            meta.issue(Field::Timestamp),
            Some(ResolveError::ZoneNotFound { .. })
        ));
    }

    struct AlwaysMp4;

    impl MimeDetector for AlwaysMp4 {
        fn detect(&self, _bytes: &[u8]) -> Option<crate::mime::DetectedType> {
            Some(crate::mime::DetectedType {
                mime_type: "video/mp4".to_string(),
                extension: "mp4".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_detector_selects_schema() {
        let raw = RawMetadata::new()
            .with("ImageWidth", 1920)
            .with("ImageHeight", 1080)
            .with("Orientation", "Rotate 90 CW");
        let meta = MetadataAssembler::default()
            .with_detector(Arc::new(AlwaysMp4))
            .assemble(&raw, JPEG, 10)
            .unwrap();

        assert_eq!(meta.content_type, ContentClass::Video);
        assert_eq!(meta.extension, "mp4");
        // video reads `Rotation`, so the photo orientation tag is ignored
        assert_eq!(meta.resolution, Some(Resolution { width: 1920, height: 1080 }));
    }

    #[test]
    fn test_hard_errors() {
        let assembler = MetadataAssembler::default();
        assert!(matches!(
            assembler.assemble(&photo_tags(), &[], 0),
            Err(MetadataError::EmptyContent)
        ));
        assert!(matches!(
            assembler.assemble(&photo_tags(), b"hello world", 11),
            Err(MetadataError::UnknownMimeType)
        ));
        assert!(matches!(
            assembler.assemble(&photo_tags(), PDF, 14),
            Err(MetadataError::UnsupportedContent(_))
        ));
    }

    #[test]
    fn test_unknown_content_as_video() {
        let config = AssemblerConfig {
            unknown_content: UnknownContentPolicy::TreatAsVideo,
            ..Default::default()
        };
        let raw = RawMetadata::new()
            .with("ImageWidth", 1920)
            .with("ImageHeight", 1080)
            .with("Rotation", 90)
            .with("CreateDate", "2023:05:01 04:15:00");
        let meta = MetadataAssembler::new(config).assemble(&raw, PDF, 14).unwrap();

        assert_eq!(meta.content_type, ContentClass::Video);
        assert_eq!(meta.mime_type, "application/pdf");
        assert_eq!(meta.resolution, Some(Resolution { width: 1080, height: 1920 }));
        assert!(meta.timestamp.unwrap().has_explicit_timezone);
    }

    #[test]
    fn test_record_serialization() {
        let raw = RawMetadata::new()
            .with("ImageWidth", 640)
            .with("ImageHeight", 480);
        let meta = MetadataAssembler::default().assemble(&raw, JPEG, 2048).unwrap();
        let json = serde_json::to_value(meta.to_record()).unwrap();

        assert_eq!(json["type"], "photo");
        assert_eq!(json["extension"], "jpg");
        assert_eq!(json["size"], "2 KB");
        assert_eq!(json["resolution"]["width"], 640);
        assert!(json.get("time").is_none());
        assert!(json.get("location").is_none());
        assert_eq!(json["issues"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_record_time_and_location() {
        let meta = MetadataAssembler::default()
            .assemble(&photo_tags(), JPEG, 10)
            .unwrap();
        let json = serde_json::to_value(meta.to_record()).unwrap();

        let expected = Utc.with_ymd_and_hms(2023, 5, 1, 4, 15, 0).unwrap().timestamp();
        assert_eq!(json["time"], expected);
        assert_eq!(json["time_has_zone"], true);
        assert_eq!(json["time_zone"], "Asia/Dhaka");
        assert!(json["location"]["lat"].as_f64().is_some());
        assert!(json["location"]["lon"].as_f64().is_some());
        assert!(json.get("issues").is_none());
    }
}
