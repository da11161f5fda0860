//! Integration tests for exif_metadata organ operations

use chrono::{TimeZone, Utc};
use exif_metadata::metrics::Metrics;
use exif_metadata::organ::{MetadataOrgan, Organ, Stimulus};
use exif_metadata::{
    AssemblerConfig, ContentClass, Field, MetadataAssembler, MetadataError, MetadataExtractor,
    RawMetadata, Resolution, ResolveError, UnknownContentPolicy,
};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01];
const MP4: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// Extractor that answers with canned tags, whatever the file
struct StaticTags(RawMetadata);

impl MetadataExtractor for StaticTags {
    fn extract(&self, path: &Path) -> exif_metadata::Result<RawMetadata> {
        if !path.exists() {
            return Err(MetadataError::ExtractionError(format!("{} missing", path.display())));
        }
        Ok(self.0.clone())
    }
}

/// Helper to create a test stimulus
fn create_stimulus(op: &str, input: serde_json::Value) -> Stimulus {
    Stimulus {
        op: op.to_string(),
        input,
        context: HashMap::new(),
    }
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn dhaka_photo() -> RawMetadata {
    RawMetadata::new()
        .with("ImageWidth", 4000)
        .with("ImageHeight", 3000)
        .with("Orientation", "Rotate 90 CW")
        .with("GPSPosition", "23 deg 46' 12.00\" N, 90 deg 23' 26.00\" E")
        .with("DateTimeOriginal", "2023:05:01 10:15:00")
}

fn phone_video() -> RawMetadata {
    RawMetadata::new()
        .with("ImageWidth", 1920)
        .with("ImageHeight", 1080)
        .with("Rotation", 90)
        .with("CreateDate", "2023:05:01 04:00:00")
        .with("CreationDate", "2023:05:01 10:15:00+06:00")
}

fn organ_with(tags: RawMetadata) -> MetadataOrgan {
    MetadataOrgan::new().with_extractor(Arc::new(StaticTags(tags)))
}

// ============================================================================
// Assembler end to end
// ============================================================================

#[test]
fn test_rotated_photo_in_dhaka() {
    let meta = MetadataAssembler::default()
        .assemble(&dhaka_photo(), JPEG, 3 * 1024 * 1024)
        .unwrap();

    assert_eq!(meta.content_type, ContentClass::Photo);
    assert_eq!(meta.resolution, Some(Resolution { width: 3000, height: 4000 }));

    let loc = meta.location.unwrap();
    assert!((loc.latitude() - 23.77).abs() < 0.01);
    assert!((loc.longitude() - 90.39).abs() < 0.01);

    let ts = meta.timestamp.unwrap();
    assert!(ts.has_explicit_timezone);
    assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 4, 15, 0).unwrap());
    assert_eq!(ts.zone.as_deref(), Some("Asia/Dhaka"));
    assert_eq!(meta.human_size, "3 MB");
}

#[test]
fn test_video_prefers_creation_date() {
    let meta = MetadataAssembler::default()
        .assemble(&phone_video(), MP4, 10)
        .unwrap();

    assert_eq!(meta.content_type, ContentClass::Video);
    assert_eq!(meta.extension, "mp4");
    assert_eq!(meta.resolution, Some(Resolution { width: 1080, height: 1920 }));

    let ts = meta.timestamp.unwrap();
    assert!(ts.has_explicit_timezone);
    assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 4, 15, 0).unwrap());
}

#[test]
fn test_video_falls_back_to_create_date() {
    let mut raw = phone_video();
    raw.insert("CreationDate", "garbage");
    let meta = MetadataAssembler::default().assemble(&raw, MP4, 10).unwrap();

    let ts = meta.timestamp.as_ref().unwrap();
    assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 4, 0, 0).unwrap());
    assert!(meta.issue(Field::Timestamp).is_none());
}

#[test]
fn test_naive_offset_applies_without_location() {
    let raw = RawMetadata::new()
        .with("ImageWidth", 100)
        .with("ImageHeight", 100)
        .with("DateTimeOriginal", "2023:05:01 10:15:00");
    let config = AssemblerConfig {
        naive_offset: chrono::FixedOffset::east_opt(2 * 3600).unwrap(),
        ..Default::default()
    };
    let meta = MetadataAssembler::new(config).assemble(&raw, JPEG, 10).unwrap();

    let ts = meta.timestamp.as_ref().unwrap();
    assert!(!ts.has_explicit_timezone);
    assert_eq!(ts.instant, Utc.with_ymd_and_hms(2023, 5, 1, 8, 15, 0).unwrap());
    assert_eq!(meta.issue(Field::Location), Some(&ResolveError::MissingTag("GPSPosition")));
}

#[test]
fn test_policy_controls_unknown_content() {
    let gzip = [0x1F, 0x8B, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];

    let rejected = MetadataAssembler::default().assemble(&phone_video(), &gzip, 8);
    assert!(matches!(rejected, Err(MetadataError::UnsupportedContent(_))));

    let config = AssemblerConfig {
        unknown_content: UnknownContentPolicy::TreatAsVideo,
        ..Default::default()
    };
    let meta = MetadataAssembler::new(config)
        .assemble(&phone_video(), &gzip, 8)
        .unwrap();
    assert_eq!(meta.content_type, ContentClass::Video);
}

// ============================================================================
// Organ operations
// ============================================================================

#[tokio::test]
async fn test_media_capabilities() {
    let organ = MetadataOrgan::new();

    let response = organ
        .stimulate(create_stimulus("media.capabilities", json!({})))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.output["name"], "exif_metadata");
    assert_eq!(response.output["functions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_organ_describe() {
    let card = MetadataOrgan::new().describe();

    assert_eq!(card.division, "media");
    assert_eq!(card.subsystem, "metadata");
    assert!(card.execution_modes.contains(&"server".to_string()));
    for func in &card.functions {
        assert!(!func.description.is_empty(), "{} has no description", func.name);
        assert!(func.idempotent);
    }
}

#[tokio::test]
async fn test_unsupported_operation() {
    let organ = MetadataOrgan::new();

    let response = organ
        .stimulate(create_stimulus("invalid.operation", json!({})))
        .await
        .unwrap();

    assert!(!response.ok);
    assert_eq!(response.output["error"], "UnsupportedOperation");
    let ops = response.output["available_operations"].as_array().unwrap();
    assert!(ops.contains(&json!("metadata.extract")));
}

#[tokio::test]
async fn test_missing_required_input() {
    let organ = MetadataOrgan::new();

    let result = organ
        .stimulate(create_stimulus("metadata.extract", json!({})))
        .await;
    assert!(result.is_err());

    let result = organ
        .stimulate(create_stimulus("metadata.normalize", json!({"input_path": "/tmp/x.jpg"})))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_extract_operation() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "photo.jpg", JPEG);
    let organ = organ_with(dhaka_photo());

    let response = organ
        .stimulate(create_stimulus("metadata.extract", json!({"input_path": path})))
        .await
        .unwrap();

    assert!(response.ok);
    let record = &response.output;
    assert_eq!(record["type"], "photo");
    assert_eq!(record["extension"], "jpg");
    assert_eq!(record["resolution"], json!({"width": 3000, "height": 4000}));
    assert_eq!(record["time"], Utc.with_ymd_and_hms(2023, 5, 1, 4, 15, 0).unwrap().timestamp());
    assert_eq!(record["time_has_zone"], true);
}

#[tokio::test]
async fn test_extract_missing_file() {
    let organ = organ_with(dhaka_photo());

    let result = organ
        .stimulate(create_stimulus(
            "metadata.extract",
            json!({"input_path": "/nonexistent/file.jpg"}),
        ))
        .await;
    assert!(result.is_err());
    assert_eq!(organ.metrics().snapshot().failed_requests, 1);
}

#[tokio::test]
async fn test_normalize_operation() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "clip.mp4", MP4);
    let organ = MetadataOrgan::new();

    let response = organ
        .stimulate(create_stimulus(
            "metadata.normalize",
            json!({
                "input_path": path,
                "tags": {
                    "ImageWidth": 1920,
                    "ImageHeight": "1080",
                    "Rotation": 0,
                    "CreateDate": "2023:05:01 04:00:00",
                    "Duration": null
                }
            }),
        ))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.output["type"], "video");
    assert_eq!(response.output["resolution"], json!({"width": 1920, "height": 1080}));
    assert!(response.output.get("location").is_none());
    let issues = response.output["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["field"], "location");
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let good = write_file(&dir, "a.jpg", JPEG);
    let empty = write_file(&dir, "b.jpg", &[]);
    let text = write_file(&dir, "c.txt", b"not media at all");
    let organ = organ_with(dhaka_photo());

    let response = organ
        .stimulate(create_stimulus(
            "metadata.batch",
            json!({"input_paths": [good, empty, text]}),
        ))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.output["total"], 3);
    assert_eq!(response.output["succeeded"], 1);

    let results = response.output["results"].as_array().unwrap();
    assert_eq!(results[0]["ok"], true);
    assert_eq!(results[0]["record"]["type"], "photo");
    assert_eq!(results[1]["ok"], false);
    assert_eq!(results[2]["ok"], false);

    let snapshot = organ.metrics().snapshot();
    assert_eq!(snapshot.operations.metadata_batch, 1);
    assert_eq!(snapshot.operations.batch_items, 3);
}

#[tokio::test]
async fn test_metrics_operation() {
    let organ = MetadataOrgan::new();
    organ
        .stimulate(create_stimulus("media.capabilities", json!({})))
        .await
        .unwrap();

    let response = organ
        .stimulate(create_stimulus("metrics", json!({})))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.output["total_requests"], 1);
    assert_eq!(response.output["failed_requests"], 0);
}

#[tokio::test]
async fn test_organs_share_metrics() {
    let metrics = Metrics::new();
    let first = MetadataOrgan::new().with_metrics(Arc::clone(&metrics));
    let second = MetadataOrgan::new().with_metrics(Arc::clone(&metrics));

    for organ in [&first, &second] {
        organ
            .stimulate(create_stimulus("media.capabilities", json!({})))
            .await
            .unwrap();
    }

    assert_eq!(metrics.snapshot().total_requests, 2);
    assert_eq!(first.metrics().snapshot().total_requests, 2);
}
