//! MIME type sniffing from content bytes

use serde::{Deserialize, Serialize};

/// MIME type and canonical file extension of a piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedType {
    pub mime_type: String,
    pub extension: String,
}

pub trait MimeDetector: Send + Sync {
    fn detect(&self, bytes: &[u8]) -> Option<DetectedType>;
}

/// Magic-number detection via the `infer` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct InferDetector;

impl MimeDetector for InferDetector {
    fn detect(&self, bytes: &[u8]) -> Option<DetectedType> {
        infer::get(bytes).map(|kind| DetectedType {
            mime_type: kind.mime_type().to_string(),
            extension: kind.extension().to_string(),
        })
    }
}
