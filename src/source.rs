//! Byte sources feeding MIME sniffing and size reporting

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Content bytes plus the full size of the item they came from
///
/// `bytes` may be a prefix of the item when the source was told to read
/// only enough for sniffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    pub bytes: Vec<u8>,
    pub size: u64,
}

pub trait ByteSource {
    fn read_all(&self) -> Result<SourceContent>;
}

/// A file on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    sniff_limit: Option<u64>,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sniff_limit: None,
        }
    }

    /// Only read the first `limit` bytes. Size still reflects the whole file.
    pub fn with_sniff_limit(mut self, limit: u64) -> Self {
        self.sniff_limit = Some(limit);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_all(&self) -> Result<SourceContent> {
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();

        let mut bytes = Vec::new();
        match self.sniff_limit {
            Some(limit) => {
                file.take(limit).read_to_end(&mut bytes)?;
            }
            None => {
                let mut file = file;
                file.read_to_end(&mut bytes)?;
            }
        }
        debug!("read {} of {} bytes from {}", bytes.len(), size, self.path.display());

        Ok(SourceContent { bytes, size })
    }
}

/// Content already held in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }
}

impl ByteSource for MemorySource {
    fn read_all(&self) -> Result<SourceContent> {
        Ok(SourceContent {
            bytes: self.bytes.clone(),
            size: self.bytes.len() as u64,
        })
    }
}
