//! Recursive discovery of media files under a root.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::warn;

use super::media_support::has_allowed_extension;

/// One discovered media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Absolute path used to open the file.
    pub absolute_path: PathBuf,
    /// Path relative to the scan root.
    pub relative_path: PathBuf,
    /// Relative path of the containing directory (empty for the root itself).
    pub directory: PathBuf,
    /// Size in bytes at walk time.
    pub file_size: u64,
    /// Modification time in epoch nanoseconds at walk time.
    pub modified_ns: i64,
}

impl FileReference {
    /// Build a reference for `path` under `root`, reading its size and mtime.
    pub fn from_path(root: &Path, path: &Path) -> Result<Self, WalkError> {
        let relative = strip_relative(root, path)?;
        let meta = path.metadata().map_err(|source| WalkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = meta.modified().map_err(|source| WalkError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = relative.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self {
            absolute_path: path.to_path_buf(),
            relative_path: relative,
            directory,
            file_size: meta.len(),
            modified_ns: to_nanos(&modified, path)?,
        })
    }
}

/// An entry the walker could not read and left out of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "skipped {}: {}", self.path.display(), self.reason)
    }
}

/// Result of walking one root.
#[derive(Debug, Default, Clone)]
pub struct WalkOutcome {
    /// Supported files, sorted by relative path.
    pub files: Vec<FileReference>,
    /// Every directory visited below the root, relative to it.
    pub directories: BTreeSet<PathBuf>,
    /// Subtrees and entries that could not be read.
    pub skipped: Vec<SkippedEntry>,
}

/// Errors that abort a walk.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Media root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Time conversion failed for {path}")]
    Time { path: PathBuf },
}

/// Recursively list supported media files under `root`.
///
/// Symlinks are not followed. Only an unreadable root fails the walk; anything
/// unreadable below it is logged and reported in [`WalkOutcome::skipped`].
pub fn walk_root(root: &Path, extensions: &[String]) -> Result<WalkOutcome, WalkError> {
    if !root.is_dir() {
        return Err(WalkError::InvalidRoot(root.to_path_buf()));
    }
    let mut outcome = WalkOutcome::default();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if dir != root => {
                warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Failed to read directory during walk"
                );
                outcome.skipped.push(skipped(&dir, &source));
                continue;
            }
            Err(source) => {
                return Err(WalkError::Io { path: dir, source });
            }
        };
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read directory entry during walk"
                    );
                    outcome.skipped.push(skipped(&dir, &err));
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to read file type during walk"
                    );
                    outcome.skipped.push(skipped(&path, &err));
                    continue;
                }
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                if let Ok(relative) = strip_relative(root, &path) {
                    outcome.directories.insert(relative);
                }
                stack.push(path);
                continue;
            }
            if !file_type.is_file() || !has_allowed_extension(&path, extensions) {
                continue;
            }
            match FileReference::from_path(root, &path) {
                Ok(file) => outcome.files.push(file),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to stat media file");
                    outcome.skipped.push(SkippedEntry {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
    outcome
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(outcome)
}

fn skipped(path: &Path, err: &std::io::Error) -> SkippedEntry {
    SkippedEntry {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn strip_relative(root: &Path, path: &Path) -> Result<PathBuf, WalkError> {
    if let Ok(relative) = path.strip_prefix(root) {
        return Ok(PathBuf::from(relative));
    }
    if let (Ok(canon_root), Ok(canon_path)) = (root.canonicalize(), path.canonicalize())
        && let Ok(relative) = canon_path.strip_prefix(&canon_root)
    {
        return Ok(PathBuf::from(relative));
    }
    Err(WalkError::InvalidRoot(path.to_path_buf()))
}

fn to_nanos(time: &SystemTime, path: &Path) -> Result<i64, WalkError> {
    let duration = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| WalkError::Time {
            path: path.to_path_buf(),
        })?;
    Ok(duration.as_nanos().min(i64::MAX as u128) as i64)
}
