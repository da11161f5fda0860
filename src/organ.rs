//! UMA Organ Interface for exif_metadata
//!
//! Exposes metadata normalization through the stimulus/response pattern so
//! orchestrators can discover and invoke it dynamically.
//!
//! ## Available Operations
//!
//! 1. `metadata.extract` - Run the extraction tool on a file and normalize
//! 2. `metadata.normalize` - Normalize caller-supplied tags for a file
//! 3. `metadata.batch` - Extract and normalize many files in parallel
//! 4. `media.capabilities` - Capability card query
//! 5. `metrics` - Request counters
//!
//! ## Example
//!
//! ```rust,no_run
//! use exif_metadata::organ::{MetadataOrgan, Organ, Stimulus};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let organ = MetadataOrgan::new();
//!
//! let response = organ.stimulate(Stimulus {
//!     op: "metadata.extract".to_string(),
//!     input: json!({"input_path": "photo.jpg"}),
//!     context: HashMap::new(),
//! }).await?;
//! println!("{}", response.output);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::assemble::MetadataAssembler;
use crate::error::MetadataError;
use crate::extract::{FallbackExtractor, MetadataExtractor};
use crate::metrics::{Metrics, Timer};
use crate::pipeline::{normalize_file, process_file, process_files, DEFAULT_SNIFF_BYTES};
use crate::raw::RawMetadata;

const OPERATIONS: [&str; 5] = [
    "metadata.extract",
    "metadata.normalize",
    "metadata.batch",
    "media.capabilities",
    "metrics",
];

/// UMA Stimulus - input to organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    pub op: String,
    pub input: Value,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// UMA Response - output from organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub output: Value,
    pub latency_ms: u64,
    pub cost: Option<f64>,
}

/// Organ trait - all SOMA organs implement this
#[async_trait]
pub trait Organ: Send + Sync {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError>;
    fn describe(&self) -> OrganCard;
}

/// Organ-level errors
#[derive(Debug, Error)]
pub enum OrganError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    ProcessingError(#[from] MetadataError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

/// Organ capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub division: String,
    pub subsystem: String,
    pub tags: Vec<String>,
    pub execution_modes: Vec<String>,
    pub functions: Vec<FunctionCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Function capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCard {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
    pub idempotent: bool,
    pub side_effects: Vec<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Value,
}

/// Metadata Normalization Organ
pub struct MetadataOrgan {
    metrics: Arc<Metrics>,
    extractor: Arc<dyn MetadataExtractor>,
    assembler: MetadataAssembler,
    sniff_limit: Option<u64>,
}

impl MetadataOrgan {
    pub fn new() -> Self {
        Self {
            metrics: Metrics::new(),
            extractor: Arc::new(FallbackExtractor::new()),
            assembler: MetadataAssembler::default(),
            sniff_limit: Some(DEFAULT_SNIFF_BYTES),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_assembler(mut self, assembler: MetadataAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// `None` reads whole files for sniffing.
    pub fn with_sniff_limit(mut self, sniff_limit: Option<u64>) -> Self {
        self.sniff_limit = sniff_limit;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle metadata.extract operation
    async fn handle_extract(&self, input: Value) -> Result<Value, OrganError> {
        let path = input_path(&input)?;
        let extractor = Arc::clone(&self.extractor);
        let assembler = self.assembler.clone();
        let sniff_limit = self.sniff_limit;

        let meta = tokio::task::spawn_blocking(move || {
            process_file(&path, extractor.as_ref(), &assembler, sniff_limit)
        })
        .await??;

        Ok(serde_json::to_value(meta.to_record())?)
    }

    /// Handle metadata.normalize operation - tags come from the caller
    async fn handle_normalize(&self, input: Value) -> Result<Value, OrganError> {
        let path = input_path(&input)?;
        let tags = input
            .get("tags")
            .ok_or_else(|| OrganError::InvalidInput("Missing tags".to_string()))?;
        let raw = RawMetadata::from_json(tags)
            .map_err(|e| OrganError::InvalidInput(e.to_string()))?;
        let assembler = self.assembler.clone();
        let sniff_limit = self.sniff_limit;

        let meta = tokio::task::spawn_blocking(move || {
            normalize_file(&path, &raw, &assembler, sniff_limit)
        })
        .await??;

        Ok(serde_json::to_value(meta.to_record())?)
    }

    /// Handle metadata.batch operation - per-item failures don't fail the batch
    async fn handle_batch(&self, input: Value) -> Result<Value, OrganError> {
        let paths: Vec<PathBuf> = input["input_paths"]
            .as_array()
            .ok_or_else(|| OrganError::InvalidInput("Missing input_paths".to_string()))?
            .iter()
            .map(|p| {
                p.as_str()
                    .map(PathBuf::from)
                    .ok_or_else(|| OrganError::InvalidInput("input_paths must be strings".to_string()))
            })
            .collect::<Result<_, _>>()?;

        self.metrics.record_batch_items(paths.len() as u64);

        let extractor = Arc::clone(&self.extractor);
        let assembler = self.assembler.clone();
        let sniff_limit = self.sniff_limit;

        let results = tokio::task::spawn_blocking(move || {
            process_files(&paths, extractor.as_ref(), &assembler, sniff_limit)
        })
        .await?;

        let mut succeeded = 0;
        let mut items = Vec::with_capacity(results.len());
        for (path, result) in results {
            let path = path.to_string_lossy().to_string();
            items.push(match result {
                Ok(meta) => {
                    succeeded += 1;
                    json!({"path": path, "ok": true, "record": meta.to_record()})
                }
                Err(e) => json!({"path": path, "ok": false, "error": e.to_string()}),
            });
        }

        Ok(json!({
            "total": items.len(),
            "succeeded": succeeded,
            "results": items,
        }))
    }

    /// Handle media.capabilities operation
    fn handle_capabilities(&self) -> Result<Value, OrganError> {
        let card = self.describe();
        serde_json::to_value(&card).map_err(OrganError::SerializationError)
    }
}

impl Default for MetadataOrgan {
    fn default() -> Self {
        Self::new()
    }
}

fn input_path(input: &Value) -> Result<PathBuf, OrganError> {
    input["input_path"]
        .as_str()
        .map(PathBuf::from)
        .ok_or_else(|| OrganError::InvalidInput("Missing input_path".to_string()))
}

#[async_trait]
impl Organ for MetadataOrgan {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError> {
        let timer = Timer::new();
        let op = stimulus.op.clone();

        let result = match stimulus.op.as_str() {
            "metadata.extract" => self.handle_extract(stimulus.input).await,
            "metadata.normalize" => self.handle_normalize(stimulus.input).await,
            "metadata.batch" => self.handle_batch(stimulus.input).await,
            "media.capabilities" => self.handle_capabilities(),
            "metrics" => Ok(json!(self.metrics.snapshot())),
            _ => {
                let latency = timer.elapsed_ms();
                self.metrics.record_request(&op, false, latency);

                return Ok(Response {
                    ok: false,
                    output: json!({
                        "error": "UnsupportedOperation",
                        "op": stimulus.op,
                        "available_operations": OPERATIONS,
                    }),
                    latency_ms: latency,
                    cost: None,
                });
            }
        };

        let latency = timer.elapsed_ms();
        self.metrics.record_request(&op, result.is_ok(), latency);
        debug!("{} finished in {}ms (ok={})", op, latency, result.is_ok());

        Ok(Response {
            ok: true,
            output: result?,
            latency_ms: latency,
            cost: None,
        })
    }

    fn describe(&self) -> OrganCard {
        let path_schema = json!({
            "type": "object",
            "properties": {"input_path": {"type": "string"}},
            "required": ["input_path"]
        });
        let record_schema = json!({
            "type": "object",
            "properties": {
                "type": {"type": "string", "enum": ["photo", "video"]},
                "extension": {"type": "string"},
                "size": {"type": "string"},
                "resolution": {"type": "object"},
                "time": {"type": "integer"},
                "time_has_zone": {"type": "boolean"},
                "time_zone": {"type": "string"},
                "location": {"type": "object"},
                "issues": {"type": "array"}
            },
            "required": ["type", "extension", "size"]
        });

        OrganCard {
            name: "exif_metadata".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Normalizes photo and video metadata into resolution, capture time and location".to_string(),
            division: "media".to_string(),
            subsystem: "metadata".to_string(),
            tags: vec![
                "media".to_string(),
                "metadata".to_string(),
                "exif".to_string(),
                "exiftool".to_string(),
                "gps".to_string(),
                "timezone".to_string(),
            ],
            execution_modes: vec![
                "embedded".to_string(),
                "sidecar".to_string(),
                "server".to_string(),
            ],
            author: None,
            repository: None,
            functions: vec![
                FunctionCard {
                    name: "metadata.extract".to_string(),
                    description: "Extract tags with ExifTool (kamadak-exif fallback) and normalize them".to_string(),
                    tags: vec!["metadata".to_string(), "extraction".to_string()],
                    examples: vec![
                        "Get the display resolution of a rotated phone photo".to_string(),
                        "Get the UTC capture time of a video".to_string(),
                    ],
                    idempotent: true,
                    side_effects: vec!["invokes exiftool".to_string()],
                    input_schema: Some(path_schema.clone()),
                    output_schema: record_schema.clone(),
                },
                FunctionCard {
                    name: "metadata.normalize".to_string(),
                    description: "Normalize an already-extracted tag set; the file is only sniffed for type and size".to_string(),
                    tags: vec!["metadata".to_string(), "normalization".to_string()],
                    examples: vec!["Normalize ExifTool JSON captured elsewhere".to_string()],
                    idempotent: true,
                    side_effects: vec![],
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "input_path": {"type": "string"},
                            "tags": {"type": "object"}
                        },
                        "required": ["input_path", "tags"]
                    })),
                    output_schema: record_schema.clone(),
                },
                FunctionCard {
                    name: "metadata.batch".to_string(),
                    description: "Extract and normalize many files in parallel; each item succeeds or fails on its own".to_string(),
                    tags: vec!["metadata".to_string(), "batch".to_string()],
                    examples: vec!["Index a directory of camera uploads".to_string()],
                    idempotent: true,
                    side_effects: vec!["invokes exiftool".to_string()],
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "input_paths": {"type": "array", "items": {"type": "string"}}
                        },
                        "required": ["input_paths"]
                    })),
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "total": {"type": "integer"},
                            "succeeded": {"type": "integer"},
                            "results": {"type": "array"}
                        }
                    }),
                },
                FunctionCard {
                    name: "media.capabilities".to_string(),
                    description: "Return this capability card".to_string(),
                    tags: vec!["introspection".to_string()],
                    examples: vec![],
                    idempotent: true,
                    side_effects: vec![],
                    input_schema: None,
                    output_schema: json!({"type": "object"}),
                },
                FunctionCard {
                    name: "metrics".to_string(),
                    description: "Request counters and average latency".to_string(),
                    tags: vec!["introspection".to_string(), "metrics".to_string()],
                    examples: vec![],
                    idempotent: true,
                    side_effects: vec![],
                    input_schema: None,
                    output_schema: json!({"type": "object"}),
                },
            ],
        }
    }
}
