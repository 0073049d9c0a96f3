use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use super::{
    callbacks::ScanCallbacks,
    cancel::CancelToken,
    options::ScanOptions,
    processor::{FileProcessor, JobQueue},
    run::{RunContext, RunSlot},
    state::{ScanMode, ScanState, ScanStatus},
    tracker::{RunId, RunTracker},
};
use crate::media_roots::{MediaRoot, RootId, RootRegistry, ScanStore, StoreError};

/// Reasons a control operation was refused.
#[derive(Debug, Error)]
pub enum ScanControlError {
    #[error("A scan is already running for root {0}")]
    AlreadyRunning(RootId),
    #[error("Media root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("No scan is running for root {0}")]
    NotRunning(RootId),
    #[error("No saved scan state for root {0}")]
    NoScanState(RootId),
    #[error("Scan for root {root_id} cannot be resumed from status {status}")]
    NotResumable { root_id: RootId, status: ScanStatus },
    #[error("Media root handle for {0} has expired; rescan the root")]
    HandleExpired(RootId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Failed to spawn scan thread: {0}")]
    Spawn(std::io::Error),
}

/// What a resume request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The saved scan had already completed.
    NothingToDo,
    Resumed(RunId),
}

/// Starts, pauses, resumes and cancels scans, one background run per root.
pub struct ScanOrchestrator {
    store: Arc<dyn ScanStore>,
    processor: Arc<dyn FileProcessor>,
    jobs: Option<Arc<dyn JobQueue>>,
    options: ScanOptions,
    callbacks: ScanCallbacks,
    roots: Arc<RootRegistry>,
    runs: Arc<RunTracker>,
}

impl ScanOrchestrator {
    pub fn new(
        store: Arc<dyn ScanStore>,
        processor: Arc<dyn FileProcessor>,
        options: ScanOptions,
        callbacks: ScanCallbacks,
    ) -> Self {
        Self {
            store,
            processor,
            jobs: None,
            options,
            callbacks,
            roots: Arc::new(RootRegistry::new()),
            runs: Arc::new(RunTracker::new()),
        }
    }

    /// Defer metadata and thumbnail work of incremental scans to `queue`.
    pub fn with_job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(queue);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Live root handles and produced items.
    pub fn roots(&self) -> &RootRegistry {
        &self.roots
    }

    /// Scan every supported file under `root` in the background.
    pub fn start(&self, root: MediaRoot) -> Result<RunId, ScanControlError> {
        self.launch(root, ScanMode::Full)
    }

    /// Scan only files that are new or changed since the last scan of `root`.
    pub fn start_incremental(&self, root: MediaRoot) -> Result<RunId, ScanControlError> {
        self.launch(root, ScanMode::Incremental)
    }

    fn launch(&self, root: MediaRoot, mode: ScanMode) -> Result<RunId, ScanControlError> {
        self.roots.register_root(root.clone());
        if self.runs.is_active(&root.id) {
            return Err(ScanControlError::AlreadyRunning(root.id));
        }
        if !root.is_reachable() {
            return Err(ScanControlError::InvalidRoot(root.path));
        }
        let (run_id, cancel) = self
            .runs
            .try_claim(&root.id)
            .ok_or_else(|| ScanControlError::AlreadyRunning(root.id.clone()))?;
        let context = self.context(root, run_id.clone(), cancel);
        spawn_run(context, move |context| context.run_fresh(mode))?;
        Ok(run_id)
    }

    /// Ask the active run for `root_id` to stop after its current segment.
    pub fn pause(&self, root_id: &RootId) -> Result<(), ScanControlError> {
        let token = self
            .runs
            .token(root_id)
            .ok_or_else(|| ScanControlError::NotRunning(root_id.clone()))?;
        info!(root = %root_id, "Pause requested");
        token.request_pause();
        Ok(())
    }

    /// Continue a paused or interrupted scan from its saved state.
    pub fn resume(&self, root_id: &RootId) -> Result<ResumeOutcome, ScanControlError> {
        if self.runs.is_active(root_id) {
            return Err(ScanControlError::AlreadyRunning(root_id.clone()));
        }
        let mut state = self
            .store
            .load_state(root_id)?
            .ok_or_else(|| ScanControlError::NoScanState(root_id.clone()))?;
        match state.status {
            ScanStatus::Completed => return Ok(ResumeOutcome::NothingToDo),
            ScanStatus::Cancelled => {
                return Err(ScanControlError::NotResumable {
                    root_id: root_id.clone(),
                    status: state.status,
                });
            }
            _ => {}
        }
        if !state.discovered {
            // The run failed before its file list existed; only a fresh start helps.
            return Err(ScanControlError::NotResumable {
                root_id: root_id.clone(),
                status: state.status,
            });
        }
        let Some(root) = self.roots.reachable_root(root_id) else {
            let err = ScanControlError::HandleExpired(root_id.clone());
            let message = err.to_string();
            warn!(root = %root_id, "Resume failed: root handle expired");
            state.fail(message.clone());
            if let Err(err) = self.store.save_state(&state) {
                warn!(root = %root_id, error = %err, "Failed to persist scan state");
            }
            self.callbacks.error(root_id, &message);
            return Err(err);
        };
        let (run_id, cancel) = self
            .runs
            .try_claim(root_id)
            .ok_or_else(|| ScanControlError::AlreadyRunning(root_id.clone()))?;
        let context = self.context(root, run_id.clone(), cancel);
        state.transition(ScanStatus::Scanning);
        self.store.save_state(&state)?;
        self.callbacks.resumed(&state);
        spawn_run(context, move |context| context.run_resumed(state))?;
        Ok(ResumeOutcome::Resumed(run_id))
    }

    /// Stop the active run for `root_id`, or cancel its saved unfinished scan.
    pub fn cancel(&self, root_id: &RootId) -> Result<(), ScanControlError> {
        if let Some(token) = self.runs.token(root_id) {
            info!(root = %root_id, "Cancel requested");
            token.request_cancel();
            return Ok(());
        }
        let Some(mut state) = self.store.load_state(root_id)? else {
            return Err(ScanControlError::NotRunning(root_id.clone()));
        };
        if state.status.is_terminal() {
            return Err(ScanControlError::NotRunning(root_id.clone()));
        }
        state.progress.remaining_files.clear();
        state.progress.current_file = None;
        state.transition(ScanStatus::Cancelled);
        self.store.save_state(&state)?;
        info!(root = %root_id, "Cancelled saved scan");
        self.callbacks.cancelled(&state);
        Ok(())
    }

    /// Last saved state for `root_id`.
    pub fn status(&self, root_id: &RootId) -> Result<Option<ScanState>, ScanControlError> {
        Ok(self.store.load_state(root_id)?)
    }

    pub fn is_running(&self, root_id: &RootId) -> bool {
        self.runs.is_active(root_id)
    }

    /// Saved scans that can still be resumed or cancelled.
    pub fn list_incomplete(&self) -> Result<Vec<ScanState>, ScanControlError> {
        Ok(self.store.list_incomplete()?)
    }

    /// Block until `root_id` has no active run; false on timeout.
    pub fn wait_idle(&self, root_id: &RootId, timeout: Duration) -> bool {
        self.runs.wait_idle(root_id, timeout)
    }

    fn context(&self, root: MediaRoot, run_id: RunId, cancel: CancelToken) -> RunContext {
        let slot = RunSlot::new(Arc::clone(&self.runs), root.id.clone(), run_id);
        RunContext {
            store: Arc::clone(&self.store),
            processor: Arc::clone(&self.processor),
            jobs: self.jobs.clone(),
            options: self.options.clone(),
            callbacks: self.callbacks.clone(),
            roots: Arc::clone(&self.roots),
            root,
            cancel,
            _slot: slot,
        }
    }
}

/// Run `body` on a detached named thread; the slot is freed if spawning fails.
fn spawn_run(
    context: RunContext,
    body: impl FnOnce(RunContext) + Send + 'static,
) -> Result<(), ScanControlError> {
    let name = format!("vaultscan-{}", context.root.id);
    thread::Builder::new()
        .name(name)
        .spawn(move || body(context))
        .map(|_| ())
        .map_err(ScanControlError::Spawn)
}
