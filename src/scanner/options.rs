use crate::config::ScanSettings;
use crate::media_roots::{DEFAULT_CHUNK_BYTES, default_extensions};

use super::pool::default_concurrency;

/// Files dispatched between checkpoints.
pub const DEFAULT_SEGMENT_SIZE: usize = 10;

/// Tunables for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Files processed between checkpoints; pause and cancel take effect at
    /// segment boundaries.
    pub segment_size: usize,
    /// Maximum files in flight at once.
    pub concurrency: usize,
    /// Bytes sampled from each end of a file when hashing.
    pub hash_chunk_bytes: usize,
    /// Allowed file extensions, without dots.
    pub extensions: Vec<String>,
    /// Mark assets whose content hash matches an earlier file.
    pub detect_duplicates: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            concurrency: default_concurrency(),
            hash_chunk_bytes: DEFAULT_CHUNK_BYTES,
            extensions: default_extensions(),
            detect_duplicates: true,
        }
    }
}

impl ScanOptions {
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }
}

impl From<&ScanSettings> for ScanOptions {
    fn from(settings: &ScanSettings) -> Self {
        let concurrency = match settings.workers {
            0 => default_concurrency(),
            workers => workers,
        };
        Self {
            segment_size: settings.segment_size.max(1),
            concurrency,
            hash_chunk_bytes: settings.hash_chunk_kib.max(1) * 1024,
            extensions: settings.extensions.clone(),
            detect_duplicates: settings.detect_duplicates,
        }
    }
}
