use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod db;
pub mod hasher;
mod media_support;
pub mod registry;
pub mod walker;

pub use db::{
    MemoryScanStore, ScanStateRecord, ScanStore, SqliteScanStore, StoreError,
    normalize_relative_path,
};
pub use hasher::{DEFAULT_CHUNK_BYTES, FastHash, FastHasher, HashError};
pub use media_support::{DEFAULT_MEDIA_EXTENSIONS, default_extensions, has_allowed_extension};
pub use registry::RootRegistry;
pub use walker::{FileReference, SkippedEntry, WalkError, WalkOutcome, walk_root};

/// Stable identifier for a scanned root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(String);

impl RootId {
    /// Create a new unique root identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Rehydrate a root identifier from a stored string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RootId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user-selected top-level media folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRoot {
    pub id: RootId,
    pub name: String,
    pub path: PathBuf,
}

impl MediaRoot {
    /// Create a root with a fresh id, named after the final path component.
    pub fn new(path: PathBuf) -> Self {
        Self::new_with_id(RootId::new(), path)
    }

    /// Create a root with an existing id (used when re-attaching a known folder).
    pub fn new_with_id(id: RootId, path: PathBuf) -> Self {
        let name = display_name_for(&path);
        Self { id, name, path }
    }

    /// Override the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// True when the folder is still reachable as a directory.
    pub fn is_reachable(&self) -> bool {
        self.path.is_dir()
    }
}

fn display_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
