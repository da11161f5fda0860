//! Capture time resolution
//!
//! ## Precedence
//!
//! 1. GPS time, parsed with the schema's GPS layout (always zoned)
//! 2. Create time, parsed with the schema's create-time layout
//!
//! A wall-clock value without any offset is placed in the timezone found at
//! the item's location. Without a location, or when no zone is found there,
//! it is interpreted with the caller's `naive_offset` and flagged as not
//! having an explicit timezone.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use tracing::debug;
use tzf_rs::DefaultFinder;

use crate::error::ResolveError;
use crate::location::Location;
use crate::raw::RawMetadata;
use crate::schema::{DateLayout, MetadataKeySchema};

static FINDER: Lazy<DefaultFinder> = Lazy::new(DefaultFinder::new);

/// Geographic timezone lookup
pub trait TimezoneLookup: Send + Sync {
    fn zone_for(&self, latitude: f64, longitude: f64) -> Option<Tz>;
}

/// Lookup backed by the tzf-rs polygon database
#[derive(Debug, Clone, Copy, Default)]
pub struct TzfLookup;

impl TimezoneLookup for TzfLookup {
    fn zone_for(&self, latitude: f64, longitude: f64) -> Option<Tz> {
        let name = FINDER.get_tz_name(longitude, latitude);
        if name.is_empty() {
            return None;
        }
        name.parse::<Tz>().ok()
    }
}

/// A capture instant normalized to UTC
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimestamp {
    pub instant: DateTime<Utc>,
    /// False when the instant is a naive wall-clock reading with an assumed offset.
    pub has_explicit_timezone: bool,
    /// IANA name of the zone inferred from the location, if any.
    pub zone: Option<String>,
}

/// A resolved timestamp plus the soft failure that reduced its confidence, if any
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampOutcome {
    pub timestamp: ResolvedTimestamp,
    pub soft_error: Option<ResolveError>,
}

enum ParsedTime {
    Instant(DateTime<Utc>),
    Wall(NaiveDateTime),
}

pub fn resolve_timestamp(
    raw: &RawMetadata,
    schema: &MetadataKeySchema,
    location: Option<&Location>,
    timezones: &dyn TimezoneLookup,
    naive_offset: FixedOffset,
) -> Result<TimestampOutcome, ResolveError> {
    let parsed = read_time(raw, schema.gps_time, schema.gps_time_layout)
        .or_else(|| read_time(raw, schema.create_time, schema.create_time_layout))
        .ok_or(ResolveError::TimeNotFound)?;

    Ok(match parsed {
        ParsedTime::Instant(instant) => TimestampOutcome {
            timestamp: ResolvedTimestamp {
                instant,
                has_explicit_timezone: true,
                zone: None,
            },
            soft_error: None,
        },
        ParsedTime::Wall(naive) => localize(naive, location, timezones, naive_offset),
    })
}

fn read_time(raw: &RawMetadata, tag: &'static str, layout: DateLayout) -> Option<ParsedTime> {
    let Some(value) = raw.get_string(tag) else {
        debug!("couldn't fetch `{}`", tag);
        return None;
    };
    let parsed = parse_with_layout(&value, layout);
    if parsed.is_none() {
        debug!("couldn't parse `{}` value {:?} with `{}`", tag, value, layout.format());
    }
    parsed
}

fn parse_with_layout(value: &str, layout: DateLayout) -> Option<ParsedTime> {
    let value = value.trim();
    match layout {
        DateLayout::Offset(format) => DateTime::parse_from_str(value, format)
            .ok()
            .map(|dt| ParsedTime::Instant(dt.with_timezone(&Utc))),
        DateLayout::Utc(format) => NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| ParsedTime::Instant(Utc.from_utc_datetime(&naive))),
        DateLayout::Local(format) => {
            // an offset present in the string is honored even on a local layout
            let zoned = format!("{}%:z", format);
            if let Ok(dt) = DateTime::parse_from_str(value, &zoned) {
                return Some(ParsedTime::Instant(dt.with_timezone(&Utc)));
            }
            NaiveDateTime::parse_from_str(value, format)
                .ok()
                .map(ParsedTime::Wall)
        }
    }
}

fn localize(
    naive: NaiveDateTime,
    location: Option<&Location>,
    timezones: &dyn TimezoneLookup,
    naive_offset: FixedOffset,
) -> TimestampOutcome {
    let Some(location) = location else {
        return assumed(naive, naive_offset, None);
    };

    match timezones.zone_for(location.latitude(), location.longitude()) {
        Some(tz) => TimestampOutcome {
            timestamp: ResolvedTimestamp {
                instant: wall_time_in_zone(naive, tz),
                has_explicit_timezone: true,
                zone: Some(tz.name().to_string()),
            },
            soft_error: None,
        },
        None => {
            debug!(
                "no timezone for ({}, {}), keeping naive time",
                location.latitude(),
                location.longitude()
            );
            let soft_error = ResolveError::ZoneNotFound {
                latitude: location.latitude(),
                longitude: location.longitude(),
            };
            assumed(naive, naive_offset, Some(soft_error))
        }
    }
}

fn assumed(
    naive: NaiveDateTime,
    offset: FixedOffset,
    soft_error: Option<ResolveError>,
) -> TimestampOutcome {
    TimestampOutcome {
        timestamp: ResolvedTimestamp {
            instant: shift_by_offset(naive, offset),
            has_explicit_timezone: false,
            zone: None,
        },
        soft_error,
    }
}

/// Place a wall-clock time in `tz`. Ambiguous times (DST fold) take the
/// earlier instant; nonexistent times (DST gap) use the offset in force at
/// the naive instant read as UTC.
fn wall_time_in_zone(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => shift_by_offset(naive, tz.offset_from_utc_datetime(&naive).fix()),
    }
}

fn shift_by_offset(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<Utc> {
    let utc = naive - Duration::seconds(offset.local_minus_utc() as i64);
    Utc.from_utc_datetime(&utc)
}
