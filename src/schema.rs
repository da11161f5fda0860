//! Per-class tag names and date layouts
//!
//! Tag names are the ones ExifTool reports when run without `-n`, so that
//! `Orientation` and `GPSPosition` come out as text.

use crate::classify::ContentClass;

/// A chrono format string together with what it says about the timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// Wall-clock time with no offset in the layout
    Local(&'static str),
    /// No offset in the layout, but the value is UTC by convention
    Utc(&'static str),
    /// The layout includes an explicit offset (`%:z`)
    Offset(&'static str),
}

impl DateLayout {
    pub fn format(&self) -> &'static str {
        match self {
            DateLayout::Local(f) | DateLayout::Utc(f) | DateLayout::Offset(f) => f,
        }
    }

    /// Whether a value parsed with this layout pins down an absolute instant.
    pub fn carries_zone(&self) -> bool {
        !matches!(self, DateLayout::Local(_))
    }
}

/// Tag names and date layouts for one content class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataKeySchema {
    pub width: &'static str,
    pub height: &'static str,
    pub rotation: &'static str,
    pub create_time: &'static str,
    pub create_time_layout: DateLayout,
    pub gps_time: &'static str,
    pub gps_time_layout: DateLayout,
    pub gps_position: &'static str,
}

pub const PHOTO_SCHEMA: MetadataKeySchema = MetadataKeySchema {
    width: "ImageWidth",
    height: "ImageHeight",
    rotation: "Orientation",
    create_time: "DateTimeOriginal",
    create_time_layout: DateLayout::Local("%Y:%m:%d %H:%M:%S"),
    gps_time: "GPSDateTime",
    gps_time_layout: DateLayout::Utc("%Y:%m:%d %H:%M:%SZ"),
    gps_position: "GPSPosition",
};

// QuickTime stores CreateDate in UTC
pub const VIDEO_SCHEMA: MetadataKeySchema = MetadataKeySchema {
    width: "ImageWidth",
    height: "ImageHeight",
    rotation: "Rotation",
    create_time: "CreateDate",
    create_time_layout: DateLayout::Utc("%Y:%m:%d %H:%M:%S"),
    gps_time: "CreationDate",
    gps_time_layout: DateLayout::Offset("%Y:%m:%d %H:%M:%S%:z"),
    gps_position: "GPSPosition",
};

pub fn schema_for(class: ContentClass) -> &'static MetadataKeySchema {
    match class {
        ContentClass::Photo => &PHOTO_SCHEMA,
        ContentClass::Video => &VIDEO_SCHEMA,
    }
}
