//! Raw Metadata Extraction
//!
//! Produces the flat tag bag consumed by the assembler.
//!
//! ## Backend Priority
//!
//! 1. **ExifTool** (primary) - Most comprehensive, photos and videos
//! 2. **kamadak-exif** (Rust native) - EXIF containers only (JPEG, TIFF, HEIF, PNG, WebP)
//!
//! The kamadak-exif backend synthesizes the same tag names and value formats
//! ExifTool reports (`Rotate 90 CW`, DMS `GPSPosition`, `Z`-suffixed
//! `GPSDateTime`) so both feed the same schemas.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::raw::RawMetadata;

/// Extraction tool adapter
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<RawMetadata>;
}

/// Check if ExifTool is available on the system
pub fn exiftool_available() -> bool {
    Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// ============================================================================
// ExifTool Backend (Primary)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ExifTool;

impl MetadataExtractor for ExifTool {
    fn extract(&self, path: &Path) -> Result<RawMetadata> {
        // no -n: keep human-readable Orientation and GPSPosition
        let output = Command::new("exiftool")
            .arg("-j")
            .arg(exiftool_arg(path))
            .output()
            .map_err(|e| MetadataError::ExtractionError(format!("ExifTool failed: {}", e)))?;

        if !output.status.success() {
            return Err(MetadataError::ExtractionError(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }

        let raw = RawMetadata::from_exiftool_json(&output.stdout)?;
        debug!("exiftool reported {} tags for {}", raw.len(), path.display());
        Ok(raw)
    }
}

/// ExifTool reads a leading `-` as an option, so relative paths get a `./` prefix.
fn exiftool_arg(path: &Path) -> PathBuf {
    if path.is_relative() && path.as_os_str().to_string_lossy().starts_with('-') {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

// ============================================================================
// kamadak-exif Backend (Pure Rust, Images)
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct KamadakExif;

impl MetadataExtractor for KamadakExif {
    fn extract(&self, path: &Path) -> Result<RawMetadata> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let exif_data = exif::Reader::new()
            .read_from_container(&mut reader)
            .map_err(|e| MetadataError::ExtractionError(format!("EXIF parse error: {}", e)))?;

        let raw = tags_from_exif(&exif_data);
        debug!("kamadak-exif synthesized {} tags for {}", raw.len(), path.display());
        Ok(raw)
    }
}

fn tags_from_exif(exif_data: &exif::Exif) -> RawMetadata {
    let field = |tag: exif::Tag| exif_data.get_field(tag, exif::In::PRIMARY);
    let get_u32 = |tag: exif::Tag| field(tag).and_then(|f| f.value.get_uint(0));
    let get_ascii = |tag: exif::Tag| field(tag).and_then(|f| ascii_value(&f.value));
    let get_rationals = |tag: exif::Tag| field(tag).and_then(|f| rational_values(&f.value));

    let mut raw = RawMetadata::new();

    if let Some(w) = get_u32(exif::Tag::PixelXDimension).or_else(|| get_u32(exif::Tag::ImageWidth)) {
        raw.insert("ImageWidth", w);
    }
    if let Some(h) = get_u32(exif::Tag::PixelYDimension).or_else(|| get_u32(exif::Tag::ImageLength)) {
        raw.insert("ImageHeight", h);
    }
    if let Some(text) = get_u32(exif::Tag::Orientation).and_then(orientation_text) {
        raw.insert("Orientation", text);
    }
    if let Some(dt) = get_ascii(exif::Tag::DateTimeOriginal) {
        raw.insert("DateTimeOriginal", dt);
    }

    // GPS position, only when both coordinates are present
    let lat = get_rationals(exif::Tag::GPSLatitude);
    let lon = get_rationals(exif::Tag::GPSLongitude);
    if let (Some(lat), Some(lon)) = (lat, lon) {
        let lat_ref = get_ascii(exif::Tag::GPSLatitudeRef).unwrap_or_else(|| "N".to_string());
        let lon_ref = get_ascii(exif::Tag::GPSLongitudeRef).unwrap_or_else(|| "E".to_string());
        if let (Some(lat), Some(lon)) = (format_dms(&lat, &lat_ref), format_dms(&lon, &lon_ref)) {
            raw.insert("GPSPosition", format!("{}, {}", lat, lon));
        }
    }

    // GPS date and time are stored separately, always UTC
    let date = get_ascii(exif::Tag::GPSDateStamp);
    let time = get_rationals(exif::Tag::GPSTimeStamp);
    if let (Some(date), Some(time)) = (date, time) {
        if time.len() >= 3 {
            raw.insert(
                "GPSDateTime",
                format!(
                    "{} {:02}:{:02}:{:02}Z",
                    date,
                    time[0] as u32,
                    time[1] as u32,
                    time[2].floor() as u32
                ),
            );
        }
    }

    raw
}

fn ascii_value(value: &exif::Value) -> Option<String> {
    match value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational_values(value: &exif::Value) -> Option<Vec<f64>> {
    match value {
        exif::Value::Rational(v) if !v.is_empty() => Some(v.iter().map(|r| r.to_f64()).collect()),
        _ => None,
    }
}

/// Render degree/minute/second rationals the way ExifTool prints them.
fn format_dms(parts: &[f64], hemisphere: &str) -> Option<String> {
    if parts.len() < 3 || parts.iter().any(|p| !p.is_finite()) {
        return None;
    }
    let total = parts[0] + parts[1] / 60.0 + parts[2] / 3600.0;
    let degrees = total.trunc();
    let minutes_total = (total - degrees) * 60.0;
    let minutes = minutes_total.trunc();
    let seconds = (minutes_total - minutes) * 60.0;

    Some(format!(
        "{} deg {}' {:.2}\" {}",
        degrees, minutes, seconds, hemisphere
    ))
}

/// ExifTool's text for the EXIF orientation values
fn orientation_text(value: u32) -> Option<&'static str> {
    Some(match value {
        1 => "Horizontal (normal)",
        2 => "Mirror horizontal",
        3 => "Rotate 180",
        4 => "Mirror vertical",
        5 => "Mirror horizontal and rotate 270 CW",
        6 => "Rotate 90 CW",
        7 => "Mirror horizontal and rotate 90 CW",
        8 => "Rotate 270 CW",
        _ => return None,
    })
}

// ============================================================================
// Fallback chain
// ============================================================================

/// ExifTool when installed, kamadak-exif otherwise or when ExifTool fails
#[derive(Debug, Clone, Copy)]
pub struct FallbackExtractor {
    use_exiftool: bool,
}

impl FallbackExtractor {
    pub fn new() -> Self {
        Self {
            use_exiftool: exiftool_available(),
        }
    }

    pub fn uses_exiftool(&self) -> bool {
        self.use_exiftool
    }
}

impl Default for FallbackExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor for FallbackExtractor {
    fn extract(&self, path: &Path) -> Result<RawMetadata> {
        if self.use_exiftool {
            match ExifTool.extract(path) {
                Ok(raw) => return Ok(raw),
                Err(e) => debug!("ExifTool failed on {}: {}", path.display(), e),
            }
        } else {
            debug!("ExifTool not available, using kamadak-exif");
        }
        KamadakExif.extract(path)
    }
}
