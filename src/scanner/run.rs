//! Body of one background run: discovery, then segmented processing until the
//! file list is exhausted or the run is asked to stop.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
};

use tracing::{debug, error, info, warn};

use super::{
    callbacks::ScanCallbacks,
    cancel::{CancelToken, StopReason},
    classifier::classify,
    options::ScanOptions,
    pool::{PoolOutcome, WorkError, WorkerPool},
    processor::{FileProcessor, JobQueue, MediaAsset, ProcessContext, ProcessError},
    state::{FileOutcome, OutputIndex, ScanMode, ScanState, ScanStatus, now_epoch_ms},
    tracker::{RunId, RunTracker},
};
use crate::media_roots::{
    FastHash, FileReference, MediaRoot, RootId, RootRegistry, ScanStateRecord, ScanStore,
    WalkOutcome, walk_root,
};

/// Everything a background run needs, cloned out of the orchestrator.
pub(crate) struct RunContext {
    pub(crate) store: Arc<dyn ScanStore>,
    pub(crate) processor: Arc<dyn FileProcessor>,
    pub(crate) jobs: Option<Arc<dyn JobQueue>>,
    pub(crate) options: ScanOptions,
    pub(crate) callbacks: ScanCallbacks,
    pub(crate) roots: Arc<RootRegistry>,
    pub(crate) root: MediaRoot,
    pub(crate) cancel: CancelToken,
    pub(crate) _slot: RunSlot,
}

/// Frees the root's run slot when the run ends, including by panic.
pub(crate) struct RunSlot {
    runs: Arc<RunTracker>,
    root_id: RootId,
    run_id: RunId,
}

impl RunSlot {
    pub(crate) fn new(runs: Arc<RunTracker>, root_id: RootId, run_id: RunId) -> Self {
        Self {
            runs,
            root_id,
            run_id,
        }
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.runs.release(&self.root_id, &self.run_id);
    }
}

/// Work list for the segment loop plus the lookup needed to process it.
struct Plan {
    files: HashMap<PathBuf, FileReference>,
    known_hashes: HashMap<FastHash, PathBuf>,
    outputs: OutputIndex,
}

impl RunContext {
    /// Run a brand new scan of the root.
    pub(crate) fn run_fresh(self, mode: ScanMode) {
        info!(root = %self.root.id, path = %self.root.path.display(), ?mode, "Scan started");
        let listing = match walk_root(&self.root.path, &self.options.extensions) {
            Ok(listing) => listing,
            Err(err) => {
                let mut state = ScanState::new(&self.root, mode, Vec::new());
                self.fail(&mut state, format!("Failed to walk media root: {err}"));
                return;
            }
        };
        self.save_directories(&listing);
        let previous = match self.store.records(&self.root.id) {
            Ok(records) => records,
            Err(err) => {
                let mut state = ScanState::new(&self.root, mode, Vec::new());
                self.fail(&mut state, format!("Failed to load scan manifest: {err}"));
                return;
            }
        };
        let warnings: Vec<String> = listing.skipped.iter().map(ToString::to_string).collect();
        let changes = classify(previous.clone(), listing.files);
        self.prune_deleted(&changes.deleted);

        let (work, summary) = match mode {
            ScanMode::Incremental => (changes.needs_work(), Some(changes.summary())),
            ScanMode::Full => {
                let mut all: Vec<FileReference> = changes
                    .new
                    .into_iter()
                    .chain(changes.modified)
                    .chain(changes.unchanged)
                    .collect();
                all.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
                (all, None)
            }
        };
        let remaining: Vec<PathBuf> = work.iter().map(|file| file.relative_path.clone()).collect();
        let mut state = ScanState::new(&self.root, mode, remaining);
        state.warnings = warnings;
        state.changes = summary;
        state.discovered = true;

        if let Err(err) = self.store.save_state(&state) {
            self.fail(&mut state, format!("Failed to persist initial scan state: {err}"));
            return;
        }
        if let Some(summary) = &summary {
            info!(
                root = %self.root.id,
                new = summary.new,
                modified = summary.modified,
                unchanged = summary.unchanged,
                deleted = summary.deleted,
                "Classified changes"
            );
            self.callbacks.classified(&self.root.id, summary);
        }
        state.transition(ScanStatus::Scanning);
        self.checkpoint(&state);

        let plan = self.plan(work, &previous, &state);
        self.process_segments(state, plan);
    }

    /// Continue a paused or interrupted scan from its persisted state.
    pub(crate) fn run_resumed(self, mut state: ScanState) {
        info!(
            root = %self.root.id,
            remaining = state.progress.remaining_files.len(),
            "Scan resumed"
        );
        let listing = match walk_root(&self.root.path, &self.options.extensions) {
            Ok(listing) => listing,
            Err(err) => {
                self.fail(&mut state, format!("Failed to walk media root: {err}"));
                return;
            }
        };
        self.save_directories(&listing);
        let on_disk: HashSet<PathBuf> = listing
            .files
            .iter()
            .map(|file| file.relative_path.clone())
            .collect();
        let before = state.progress.remaining_files.len();
        state
            .progress
            .remaining_files
            .retain(|path| on_disk.contains(path));
        let vanished = before - state.progress.remaining_files.len();
        if vanished > 0 {
            debug!(root = %self.root.id, vanished, "Dropping files that disappeared while paused");
            state.progress.total = state.progress.total.saturating_sub(vanished);
        }
        for skipped in &listing.skipped {
            let warning = skipped.to_string();
            if !state.warnings.contains(&warning) {
                state.warnings.push(warning);
            }
        }
        self.checkpoint(&state);

        let previous = self.store.records(&self.root.id).unwrap_or_else(|err| {
            warn!(root = %self.root.id, error = %err, "Failed to load manifest for duplicate detection");
            Vec::new()
        });
        let plan = self.plan(listing.files, &previous, &state);
        self.process_segments(state, plan);
    }

    fn plan(
        &self,
        files: Vec<FileReference>,
        previous: &[ScanStateRecord],
        state: &ScanState,
    ) -> Plan {
        let files: HashMap<PathBuf, FileReference> = files
            .into_iter()
            .map(|file| (file.relative_path.clone(), file))
            .collect();
        let pending: HashSet<&PathBuf> = state.progress.remaining_files.iter().collect();
        let mut known_hashes = HashMap::new();
        if self.options.detect_duplicates {
            for record in previous {
                let on_disk = files.contains_key(&record.relative_path);
                if on_disk && !pending.contains(&record.relative_path) {
                    known_hashes
                        .entry(record.file_hash.clone())
                        .or_insert_with(|| record.relative_path.clone());
                }
            }
        }
        Plan {
            files,
            known_hashes,
            outputs: OutputIndex::for_state(state),
        }
    }

    fn process_segments(self, mut state: ScanState, mut plan: Plan) {
        let pool = WorkerPool::new(self.options.concurrency);
        let segment_size = self.options.segment_size.max(1);
        debug!(
            root = %self.root.id,
            workers = pool.concurrency(),
            segment_size,
            "Processing segments"
        );
        loop {
            // A cancel wins even when nothing is left to do.
            if let Some(StopReason::Cancel) = self.cancel.reason() {
                self.stop(&mut state, StopReason::Cancel);
                return;
            }
            if state.is_finished() {
                self.complete(&mut state);
                return;
            }
            if let Some(reason) = self.cancel.reason() {
                self.stop(&mut state, reason);
                return;
            }
            let take = segment_size.min(state.progress.remaining_files.len());
            let segment: Vec<(PathBuf, Option<FileReference>)> = state.progress.remaining_files
                [..take]
                .iter()
                .map(|path| (path.clone(), plan.files.get(path).cloned()))
                .collect();
            let jobs = self.jobs.as_deref();
            let context = ProcessContext {
                root: &self.root,
                mode: state.mode,
                jobs,
            };
            let processor = &self.processor;
            let report = pool.run(
                &segment,
                &self.cancel,
                |(path, file)| match file {
                    Some(file) => processor.process(&context, file),
                    None => Err(ProcessError::Missing(self.root.path.join(path))),
                },
                |outcome| self.record_outcome(&mut state, &mut plan, outcome),
            );
            state.progress.remaining_files.drain(..report.dispatched);
            state.updated_at = now_epoch_ms();
            self.checkpoint(&state);
            debug!(
                root = %self.root.id,
                dispatched = report.dispatched,
                failed = report.failed,
                processed = state.progress.processed,
                total = state.progress.total,
                "Segment checkpoint"
            );
            self.callbacks.progress(&self.root.id, &state.progress);
        }
    }

    fn record_outcome(
        &self,
        state: &mut ScanState,
        plan: &mut Plan,
        outcome: PoolOutcome<'_, (PathBuf, Option<FileReference>), MediaAsset, ProcessError>,
    ) {
        let (relative_path, _) = outcome.item;
        state.progress.processed += 1;
        state.progress.current_file = Some(relative_path.clone());
        let file_outcome = match outcome.result {
            Ok(mut asset) => {
                if self.options.detect_duplicates {
                    match plan.known_hashes.get(&asset.fast_hash) {
                        Some(first) if first != &asset.relative_path => {
                            asset.duplicate_of = Some(first.clone());
                        }
                        Some(_) => {}
                        None => {
                            plan.known_hashes
                                .insert(asset.fast_hash.clone(), asset.relative_path.clone());
                        }
                    }
                }
                self.remember(&asset);
                state.record_output(&mut plan.outputs, asset.clone());
                FileOutcome {
                    root_id: state.root_id.clone(),
                    relative_path: relative_path.clone(),
                    output: Some(asset),
                    error: None,
                }
            }
            Err(err) => {
                let message = match err {
                    WorkError::Failed(err) => err.to_string(),
                    WorkError::Panicked(message) => format!("Processing panicked: {message}"),
                };
                warn!(root = %state.root_id, path = %relative_path.display(), error = %message, "File failed");
                FileOutcome {
                    root_id: state.root_id.clone(),
                    relative_path: relative_path.clone(),
                    output: None,
                    error: Some(message),
                }
            }
        };
        self.callbacks.file(&file_outcome);
        self.callbacks.progress(&state.root_id, &state.progress);
    }

    /// Record a finished asset in the manifest and the item registry.
    fn remember(&self, asset: &MediaAsset) {
        self.roots
            .register_item(asset.id.clone(), &self.root.path.join(&asset.relative_path));
        let record = ScanStateRecord {
            root_id: self.root.id.clone(),
            relative_path: asset.relative_path.clone(),
            file_hash: asset.fast_hash.clone(),
            file_size: asset.file_size,
            last_modified_ns: asset.last_modified_ns,
            last_scanned_at: now_epoch_ms(),
        };
        if let Err(err) = self.store.upsert_record(&record) {
            warn!(
                root = %self.root.id,
                path = %asset.relative_path.display(),
                error = %err,
                "Failed to update scan manifest"
            );
        }
    }

    fn complete(&self, state: &mut ScanState) {
        state.transition(ScanStatus::Completed);
        self.checkpoint(state);
        info!(
            root = %self.root.id,
            processed = state.progress.processed,
            outputs = state.outputs.len(),
            "Scan completed"
        );
        self.callbacks.completed(state);
    }

    fn stop(&self, state: &mut ScanState, reason: StopReason) {
        match reason {
            StopReason::Pause => {
                state.progress.current_file = None;
                state.transition(ScanStatus::Paused);
                self.checkpoint(state);
                info!(
                    root = %self.root.id,
                    processed = state.progress.processed,
                    total = state.progress.total,
                    "Scan paused"
                );
                self.callbacks.paused(state);
            }
            StopReason::Cancel => {
                state.progress.remaining_files.clear();
                state.progress.current_file = None;
                state.transition(ScanStatus::Cancelled);
                self.checkpoint(state);
                info!(root = %self.root.id, processed = state.progress.processed, "Scan cancelled");
                self.callbacks.cancelled(state);
            }
        }
    }

    fn fail(&self, state: &mut ScanState, message: String) {
        error!(root = %self.root.id, error = %message, "Scan failed");
        state.fail(message.clone());
        self.checkpoint(state);
        self.callbacks.error(&self.root.id, &message);
    }

    fn checkpoint(&self, state: &ScanState) {
        if let Err(err) = self.store.save_state(state) {
            warn!(root = %state.root_id, status = %state.status, error = %err, "Failed to persist scan state");
        }
    }

    fn save_directories(&self, listing: &WalkOutcome) {
        if let Err(err) = self.store.save_directories(&self.root.id, &listing.directories) {
            warn!(root = %self.root.id, error = %err, "Failed to persist directory listing");
        }
    }

    fn prune_deleted(&self, deleted: &[PathBuf]) {
        if deleted.is_empty() {
            return;
        }
        match self.store.delete_records(&self.root.id, deleted) {
            Ok(removed) => debug!(root = %self.root.id, removed, "Pruned deleted files from manifest"),
            Err(err) => warn!(root = %self.root.id, error = %err, "Failed to prune deleted files"),
        }
    }
}
