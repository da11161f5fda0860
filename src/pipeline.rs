//! File-level pipeline
//!
//! byte source → extraction tool → assembler, for one path or many.
//! Items never share state, so batches fan out over the rayon pool.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::assemble::{MetadataAssembler, StructuredMetadata};
use crate::error::Result;
use crate::extract::MetadataExtractor;
use crate::raw::RawMetadata;
use crate::source::{ByteSource, FileSource};

/// Leading bytes read for MIME sniffing when the caller doesn't say otherwise
pub const DEFAULT_SNIFF_BYTES: u64 = 8192;

/// Extract and normalize one file.
pub fn process_file(
    path: &Path,
    extractor: &dyn MetadataExtractor,
    assembler: &MetadataAssembler,
    sniff_limit: Option<u64>,
) -> Result<StructuredMetadata> {
    let raw = extractor.extract(path)?;
    normalize_file(path, &raw, assembler, sniff_limit)
}

/// Normalize caller-supplied tags; the file is only read for sniffing and size.
pub fn normalize_file(
    path: &Path,
    raw: &RawMetadata,
    assembler: &MetadataAssembler,
    sniff_limit: Option<u64>,
) -> Result<StructuredMetadata> {
    let mut source = FileSource::new(path);
    if let Some(limit) = sniff_limit {
        source = source.with_sniff_limit(limit);
    }
    let content = source.read_all()?;

    let meta = assembler.assemble(raw, &content.bytes, content.size)?;
    debug!(
        "{}: {} {} with {} issue(s)",
        path.display(),
        meta.content_type,
        meta.human_size,
        meta.issues.len()
    );
    Ok(meta)
}

/// Process many files in parallel. One result per input, in input order.
pub fn process_files(
    paths: &[PathBuf],
    extractor: &dyn MetadataExtractor,
    assembler: &MetadataAssembler,
    sniff_limit: Option<u64>,
) -> Vec<(PathBuf, Result<StructuredMetadata>)> {
    paths
        .par_iter()
        .map(|path| {
            let result = process_file(path, extractor, assembler, sniff_limit);
            if let Err(e) = &result {
                warn!("failed to process {}: {}", path.display(), e);
            }
            (path.clone(), result)
        })
        .collect()
}
