//! Split a fresh directory listing against the last manifest.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::media_roots::{FileReference, ScanStateRecord};

/// Files partitioned by how they changed since the previous scan.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub new: Vec<FileReference>,
    pub modified: Vec<FileReference>,
    pub unchanged: Vec<FileReference>,
    /// Relative paths present in the manifest but not on disk.
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            total: self.new.len() + self.modified.len() + self.unchanged.len(),
            new: self.new.len(),
            modified: self.modified.len(),
            unchanged: self.unchanged.len(),
            deleted: self.deleted.len(),
        }
    }

    /// Files that need processing, in listing order.
    pub fn needs_work(&self) -> Vec<FileReference> {
        let mut files: Vec<FileReference> = self
            .new
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect();
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        files
    }
}

/// Counts reported to `on_classified` and kept on the scan state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Files currently on disk.
    pub total: usize,
    pub new: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

/// Classify `current` against `previous` using size and mtime only.
pub fn classify(previous: Vec<ScanStateRecord>, current: Vec<FileReference>) -> ChangeSet {
    let mut known: HashMap<PathBuf, ScanStateRecord> = previous
        .into_iter()
        .map(|record| (record.relative_path.clone(), record))
        .collect();
    let mut changes = ChangeSet::default();
    let mut seen = HashSet::with_capacity(current.len());
    for file in current {
        if !seen.insert(file.relative_path.clone()) {
            continue;
        }
        match known.remove(&file.relative_path) {
            None => changes.new.push(file),
            Some(record)
                if record.file_size == file.file_size
                    && record.last_modified_ns == file.modified_ns =>
            {
                changes.unchanged.push(file)
            }
            Some(_) => changes.modified.push(file),
        }
    }
    let mut deleted: Vec<PathBuf> = known.into_keys().collect();
    deleted.sort();
    changes.deleted = deleted;
    changes
}
