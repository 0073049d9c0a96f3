use std::sync::Arc;

use super::classifier::ChangeSummary;
use super::state::{FileOutcome, ScanProgress, ScanState};
use crate::media_roots::RootId;

pub type ProgressCallback = Arc<dyn Fn(&RootId, &ScanProgress) + Send + Sync>;
pub type FileCallback = Arc<dyn Fn(&FileOutcome) + Send + Sync>;
pub type ClassifiedCallback = Arc<dyn Fn(&RootId, &ChangeSummary) + Send + Sync>;
pub type StateCallback = Arc<dyn Fn(&ScanState) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&RootId, &str) + Send + Sync>;

/// Host hooks fired by scan runs. Every hook is optional.
///
/// Hooks run on the scan's background thread (or the caller's thread for
/// synchronous transitions) with no orchestrator lock held.
#[derive(Clone, Default)]
pub struct ScanCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_file: Option<FileCallback>,
    pub on_classified: Option<ClassifiedCallback>,
    pub on_paused: Option<StateCallback>,
    pub on_resumed: Option<StateCallback>,
    pub on_completed: Option<StateCallback>,
    pub on_cancelled: Option<StateCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl ScanCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(
        mut self,
        f: impl Fn(&RootId, &ScanProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_file(mut self, f: impl Fn(&FileOutcome) + Send + Sync + 'static) -> Self {
        self.on_file = Some(Arc::new(f));
        self
    }

    pub fn on_classified(
        mut self,
        f: impl Fn(&RootId, &ChangeSummary) + Send + Sync + 'static,
    ) -> Self {
        self.on_classified = Some(Arc::new(f));
        self
    }

    pub fn on_paused(mut self, f: impl Fn(&ScanState) + Send + Sync + 'static) -> Self {
        self.on_paused = Some(Arc::new(f));
        self
    }

    pub fn on_resumed(mut self, f: impl Fn(&ScanState) + Send + Sync + 'static) -> Self {
        self.on_resumed = Some(Arc::new(f));
        self
    }

    pub fn on_completed(mut self, f: impl Fn(&ScanState) + Send + Sync + 'static) -> Self {
        self.on_completed = Some(Arc::new(f));
        self
    }

    pub fn on_cancelled(mut self, f: impl Fn(&ScanState) + Send + Sync + 'static) -> Self {
        self.on_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&RootId, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn progress(&self, root_id: &RootId, progress: &ScanProgress) {
        if let Some(callback) = &self.on_progress {
            callback(root_id, progress);
        }
    }

    pub(crate) fn file(&self, outcome: &FileOutcome) {
        if let Some(callback) = &self.on_file {
            callback(outcome);
        }
    }

    pub(crate) fn classified(&self, root_id: &RootId, summary: &ChangeSummary) {
        if let Some(callback) = &self.on_classified {
            callback(root_id, summary);
        }
    }

    pub(crate) fn paused(&self, state: &ScanState) {
        if let Some(callback) = &self.on_paused {
            callback(state);
        }
    }

    pub(crate) fn resumed(&self, state: &ScanState) {
        if let Some(callback) = &self.on_resumed {
            callback(state);
        }
    }

    pub(crate) fn completed(&self, state: &ScanState) {
        if let Some(callback) = &self.on_completed {
            callback(state);
        }
    }

    pub(crate) fn cancelled(&self, state: &ScanState) {
        if let Some(callback) = &self.on_cancelled {
            callback(state);
        }
    }

    pub(crate) fn error(&self, root_id: &RootId, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(root_id, message);
        }
    }
}

impl std::fmt::Debug for ScanCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_file", &self.on_file.is_some())
            .field("on_classified", &self.on_classified.is_some())
            .field("on_paused", &self.on_paused.is_some())
            .field("on_resumed", &self.on_resumed.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
