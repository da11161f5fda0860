use thiserror::Error;

/// Hard failures: the item cannot be normalized at all.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Content is empty")]
    EmptyContent,

    #[error("Could not detect a MIME type from content")]
    UnknownMimeType,

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("Extraction failed: {0}")]
    ExtractionError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

/// Failures while parsing a degrees/minutes/seconds position string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected `latitude, longitude`, got {0} part(s)")]
    PartCount(usize),

    #[error("expected 4 tokens in `{0}`")]
    TooFewTokens(String),

    #[error("invalid number `{0}`")]
    InvalidNumber(String),

    #[error("invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Field-level failures. These never abort assembly; they end up as
/// absent fields plus an entry in the record's issue list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("tag `{0}` not found")]
    MissingTag(&'static str),

    #[error("tag `{tag}` has unusable value `{value}`")]
    InvalidTag { tag: &'static str, value: String },

    #[error("invalid location: {0}")]
    Location(#[from] ParseError),

    #[error("time not found")]
    TimeNotFound,

    #[error("no timezone found for ({latitude}, {longitude})")]
    ZoneNotFound { latitude: f64, longitude: f64 },
}
