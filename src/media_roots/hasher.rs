//! Head + tail + size content identity.
//!
//! Hashing only the ends of a file keeps multi-gigabyte media cheap to
//! fingerprint. Equal first chunk, last chunk and size count as equal content.

use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Default number of bytes sampled from each end of a file.
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of a file's sampled bytes and size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FastHash(String);

impl FastHash {
    /// Wrap a previously computed digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FastHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while hashing; never retried.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Computes [`FastHash`] values with a fixed chunk size.
#[derive(Debug, Clone, Copy)]
pub struct FastHasher {
    chunk_bytes: usize,
}

impl Default for FastHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_BYTES)
    }
}

impl FastHasher {
    /// Create a hasher sampling `chunk_bytes` from each end (minimum 1).
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }

    /// Hash the file at `path` using its on-disk length as the declared size.
    pub fn hash_file(&self, path: &Path) -> Result<FastHash, HashError> {
        let io_err = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let size = file.metadata().map_err(io_err)?.len();
        self.hash_reader(&mut file, size).map_err(io_err)
    }

    /// Hash any seekable source whose declared length is `size`.
    pub fn hash_reader<R: Read + Seek>(&self, reader: &mut R, size: u64) -> std::io::Result<FastHash> {
        let chunk = self.chunk_bytes as u64;
        let mut hasher = Sha256::new();

        reader.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(size.min(chunk) as usize);
        reader.by_ref().take(chunk).read_to_end(&mut buffer)?;
        hasher.update(&buffer);

        if size > chunk.saturating_mul(2) {
            buffer.clear();
            reader.seek(SeekFrom::Start(size - chunk))?;
            reader.by_ref().take(chunk).read_to_end(&mut buffer)?;
            hasher.update(&buffer);
        }

        hasher.update(size.to_string().as_bytes());
        Ok(FastHash(format!("{:x}", hasher.finalize())))
    }
}
