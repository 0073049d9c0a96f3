use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media_roots::{DEFAULT_CHUNK_BYTES, default_extensions};
use crate::scanner::DEFAULT_SEGMENT_SIZE;

pub(super) const MAX_WORKERS: usize = 64;
const MAX_SEGMENT_SIZE: usize = 10_000;
const MAX_HASH_CHUNK_KIB: usize = 16 * 1024;

/// User-editable scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Concurrent files per scan; 0 picks a value from the host's parallelism.
    pub workers: usize,
    pub segment_size: usize,
    /// KiB sampled from each end of a file when hashing.
    pub hash_chunk_kib: usize,
    pub extensions: Vec<String>,
    pub detect_duplicates: bool,
    /// Scan database location; defaults to the app root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            segment_size: DEFAULT_SEGMENT_SIZE,
            hash_chunk_kib: DEFAULT_CHUNK_BYTES / 1024,
            extensions: default_extensions(),
            detect_duplicates: true,
            store_path: None,
        }
    }
}

impl ScanSettings {
    /// Clamp numeric values and clean up the extension list.
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.min(MAX_WORKERS);
        self.segment_size = self.segment_size.clamp(1, MAX_SEGMENT_SIZE);
        self.hash_chunk_kib = self.hash_chunk_kib.clamp(1, MAX_HASH_CHUNK_KIB);
        let mut extensions: Vec<String> = Vec::with_capacity(self.extensions.len());
        for ext in &self.extensions {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        self.extensions = if extensions.is_empty() {
            default_extensions()
        } else {
            extensions
        };
        self
    }
}

/// Errors that may occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}
