use std::{
    collections::HashMap,
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use super::classifier::ChangeSummary;
use super::processor::MediaAsset;
use crate::media_roots::{MediaRoot, RootId};

/// Lifecycle status of a root's scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Paused,
    Completed,
    Error,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Paused => "paused",
            ScanStatus::Completed => "completed",
            ScanStatus::Error => "error",
            ScanStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled scans never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Cancelled)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run processes every file or only new and modified ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Full,
    Incremental,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub total: usize,
    pub processed: usize,
    pub current_file: Option<PathBuf>,
    /// Relative paths not yet attempted, in processing order.
    pub remaining_files: Vec<PathBuf>,
}

/// Persisted progress of one root's scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanState {
    pub root_id: RootId,
    pub root_name: String,
    #[serde(default)]
    pub mode: ScanMode,
    pub status: ScanStatus,
    pub progress: ScanProgress,
    #[serde(default)]
    pub outputs: Vec<MediaAsset>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set once the file list was built and persisted; only such scans resume.
    #[serde(default)]
    pub discovered: bool,
    #[serde(default)]
    pub changes: Option<ChangeSummary>,
    pub started_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub paused_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl ScanState {
    /// Fresh idle state with every file still to do.
    pub fn new(root: &MediaRoot, mode: ScanMode, files: Vec<PathBuf>) -> Self {
        let now = now_epoch_ms();
        Self {
            root_id: root.id.clone(),
            root_name: root.name.clone(),
            mode,
            status: ScanStatus::Idle,
            progress: ScanProgress {
                total: files.len(),
                processed: 0,
                current_file: None,
                remaining_files: files,
            },
            outputs: Vec::new(),
            error: None,
            warnings: Vec::new(),
            discovered: false,
            changes: None,
            started_at: now,
            updated_at: now,
            paused_at: None,
            completed_at: None,
        }
    }

    /// Move to `status`, stamping the matching timestamps.
    pub(crate) fn transition(&mut self, status: ScanStatus) {
        let now = now_epoch_ms();
        self.status = status;
        self.updated_at = now;
        match status {
            ScanStatus::Paused => self.paused_at = Some(now),
            ScanStatus::Completed => {
                self.completed_at = Some(now);
                self.progress.current_file = None;
            }
            ScanStatus::Scanning => {
                self.paused_at = None;
                self.error = None;
            }
            _ => {}
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.transition(ScanStatus::Error);
    }

    /// Append an output, replacing an earlier one for the same path.
    pub(crate) fn record_output(&mut self, index: &mut OutputIndex, asset: MediaAsset) {
        match index.0.get(&asset.relative_path) {
            Some(&position) => self.outputs[position] = asset,
            None => {
                index
                    .0
                    .insert(asset.relative_path.clone(), self.outputs.len());
                self.outputs.push(asset);
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress.remaining_files.is_empty()
    }
}

/// Position of each output by relative path, rebuilt per run.
#[derive(Debug, Default)]
pub(crate) struct OutputIndex(HashMap<PathBuf, usize>);

impl OutputIndex {
    pub(crate) fn for_state(state: &ScanState) -> Self {
        Self(
            state
                .outputs
                .iter()
                .enumerate()
                .map(|(position, asset)| (asset.relative_path.clone(), position))
                .collect(),
        )
    }
}

/// Result of processing one file, delivered to `on_file`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub root_id: RootId,
    pub relative_path: PathBuf,
    pub output: Option<MediaAsset>,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
