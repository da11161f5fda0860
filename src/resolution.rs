//! Rotation-aware resolution lookup

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResolveError;
use crate::raw::RawMetadata;
use crate::schema::MetadataKeySchema;

/// Display dimensions in pixels, both always positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Read width/height via the schema and swap them for quarter-turn rotations.
///
/// Any rotation text containing `90` counts as a quarter turn (`Rotate 90 CW`,
/// a video `Rotation` of `90`). A missing rotation tag means no rotation.
pub fn resolve_resolution(
    raw: &RawMetadata,
    schema: &MetadataKeySchema,
) -> Result<Resolution, ResolveError> {
    let width = read_dimension(raw, schema.width)?;
    let height = read_dimension(raw, schema.height)?;

    let rotation = raw.get_string(schema.rotation);
    if rotation.is_none() {
        debug!("couldn't fetch rotation from `{}`, assuming none", schema.rotation);
    }

    if rotation.as_deref().is_some_and(|r| r.contains("90")) {
        debug!("rotation {:?} swaps axes", rotation);
        return Ok(Resolution { width: height, height: width });
    }
    Ok(Resolution { width, height })
}

fn read_dimension(raw: &RawMetadata, tag: &'static str) -> Result<u32, ResolveError> {
    let value = raw
        .get_int(tag)
        .ok_or(ResolveError::MissingTag(tag))?
        .map_err(|value| ResolveError::InvalidTag { tag, value })?;

    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ResolveError::InvalidTag { tag, value: value.to_string() }),
    }
}
