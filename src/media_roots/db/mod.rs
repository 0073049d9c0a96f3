use std::{
    collections::BTreeSet,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FastHash, RootId};
use crate::scanner::ScanState;

mod memory;
mod schema;
mod sqlite;
/// Path normalization shared by store implementations.
pub mod util;

pub use memory::MemoryScanStore;
pub use sqlite::SqliteScanStore;
pub use util::normalize_relative_path;

/// Manifest entry for one previously scanned file under a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStateRecord {
    pub root_id: RootId,
    /// File path relative to the root.
    pub relative_path: PathBuf,
    pub file_hash: FastHash,
    /// File size in bytes.
    pub file_size: u64,
    /// Modification time in epoch nanoseconds.
    pub last_modified_ns: i64,
    /// Epoch milliseconds when the file was last hashed.
    pub last_scanned_at: i64,
}

/// Errors returned by scan-state persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Stored scan state could not be encoded or decoded.
    #[error("Scan state encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to create a parent directory for the database.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Provided path was not relative to the root.
    #[error("Path must be relative to the media root: {0}")]
    PathMustBeRelative(PathBuf),
    /// Provided path contained disallowed components or was empty.
    #[error("Path contains invalid relative components: {0}")]
    InvalidRelativePath(PathBuf),
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
    /// A host-provided store could not be reached.
    #[error("Scan store unavailable: {0}")]
    Unavailable(String),
}

/// Durable get/put contract the scan engine persists through.
///
/// Implementations must be safe to share across the orchestrator's background
/// runs; each root is written by at most one run at a time.
pub trait ScanStore: Send + Sync {
    /// Insert or replace the scan state for its root.
    fn save_state(&self, state: &ScanState) -> Result<(), StoreError>;

    /// Load the last saved scan state for `root_id`.
    fn load_state(&self, root_id: &RootId) -> Result<Option<ScanState>, StoreError>;

    /// Every saved state that is neither completed nor cancelled.
    fn list_incomplete(&self) -> Result<Vec<ScanState>, StoreError>;

    /// Manifest records for a root.
    fn records(&self, root_id: &RootId) -> Result<Vec<ScanStateRecord>, StoreError>;

    /// Insert or replace one manifest record.
    fn upsert_record(&self, record: &ScanStateRecord) -> Result<(), StoreError>;

    /// Remove manifest records by relative path; returns how many were removed.
    fn delete_records(&self, root_id: &RootId, paths: &[PathBuf]) -> Result<usize, StoreError>;

    /// Replace the set of directories seen under a root.
    fn save_directories(
        &self,
        root_id: &RootId,
        directories: &BTreeSet<PathBuf>,
    ) -> Result<(), StoreError>;

    /// Directories recorded by the last walk of a root.
    fn directories(&self, root_id: &RootId) -> Result<BTreeSet<PathBuf>, StoreError>;
}
