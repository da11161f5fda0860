//! Content classification from MIME types

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The two supported content classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    Photo,
    Video,
}

impl ContentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentClass::Photo => "photo",
            ContentClass::Video => "video",
        }
    }
}

impl std::fmt::Display for ContentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a MIME type such as `image/jpeg` or `video/mp4`.
///
/// Returns `None` for anything that is not `image/*` or `video/*`; what to do
/// with such items is decided by the caller (see `UnknownContentPolicy`).
pub fn classify(mime_type: &str) -> Option<ContentClass> {
    let mut pieces = mime_type.split('/');
    let kind = pieces.next()?;
    // a type without a subtype is not a MIME type
    pieces.next()?;

    let class = match kind {
        "image" => ContentClass::Photo,
        "video" => ContentClass::Video,
        _ => return None,
    };
    debug!("classified `{}` as {}", mime_type, class);
    Some(class)
}
