#![allow(dead_code)]

pub mod env;

use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
    sync::{
        Arc, Condvar, Mutex, OnceLock, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tempfile::TempDir;
use vaultscan::{
    media_roots::{
        FileReference, MediaRoot, MemoryScanStore, RootId, ScanStateRecord, ScanStore, StoreError,
    },
    scanner::{
        ChangeSummary, FileOutcome, FileProcessor, MediaAsset, MediaFileProcessor, ProcessContext,
        ProcessError, ScanCallbacks, ScanOptions, ScanOrchestrator, ScanState, ScanStatus,
    },
};

pub const WAIT: Duration = Duration::from_secs(20);

/// Write `count` distinct clips named `clip_NN.mp4` plus one non-media file.
pub fn write_clips(root: &Path, count: usize) -> Vec<PathBuf> {
    std::fs::create_dir_all(root).expect("create root");
    std::fs::write(root.join("notes.txt"), b"not media").expect("write notes");
    (0..count)
        .map(|i| {
            let name = format!("clip_{i:02}.mp4");
            std::fs::write(root.join(&name), format!("clip payload {i}")).expect("write clip");
            PathBuf::from(name)
        })
        .collect()
}

/// Blocks processing until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

/// Real processing with injectable failures, delays and a start gate.
#[derive(Default)]
pub struct ScriptedProcessor {
    pub inner: MediaFileProcessor,
    pub fail: HashSet<PathBuf>,
    pub delay: Duration,
    pub gate: Option<Arc<Gate>>,
}

impl FileProcessor for ScriptedProcessor {
    fn process(
        &self,
        context: &ProcessContext<'_>,
        file: &FileReference,
    ) -> Result<MediaAsset, ProcessError> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail.contains(&file.relative_path) {
            return Err(ProcessError::Failed(format!(
                "corrupt container: {}",
                file.relative_path.display()
            )));
        }
        self.inner.process(context, file)
    }
}

/// Everything the callbacks observed.
#[derive(Default)]
pub struct Events {
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub files: Mutex<Vec<FileOutcome>>,
    pub classified: Mutex<Vec<ChangeSummary>>,
    pub paused: Mutex<Vec<ScanState>>,
    pub resumed: Mutex<Vec<ScanState>>,
    pub completed: Mutex<Vec<ScanState>>,
    pub cancelled: Mutex<Vec<ScanState>>,
    pub errors: Mutex<Vec<String>>,
}

impl Events {
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|outcome| outcome.relative_path.clone())
            .collect()
    }
}

pub struct HarnessBuilder {
    options: ScanOptions,
    processor: ScriptedProcessor,
    store: Option<Arc<dyn ScanStore>>,
    pause_at: Option<usize>,
    cancel_at: Option<usize>,
    cancel_on_classified: bool,
}

impl HarnessBuilder {
    pub fn options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn processor(mut self, processor: ScriptedProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn store(mut self, store: Arc<dyn ScanStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Request a pause from `on_progress` the first time `processed` hits `n`.
    pub fn pause_at(mut self, n: usize) -> Self {
        self.pause_at = Some(n);
        self
    }

    /// Request a cancel from `on_progress` the first time `processed` hits `n`.
    pub fn cancel_at(mut self, n: usize) -> Self {
        self.cancel_at = Some(n);
        self
    }

    /// Request a cancel from `on_classified`, before any file is processed.
    pub fn cancel_on_classified(mut self) -> Self {
        self.cancel_on_classified = true;
        self
    }

    pub fn build(self) -> Harness {
        let events = Arc::new(Events::default());
        let handle: Arc<OnceLock<Weak<ScanOrchestrator>>> = Arc::new(OnceLock::new());
        let fired = Arc::new(AtomicBool::new(false));

        let pause_at = self.pause_at;
        let cancel_at = self.cancel_at;
        let cancel_on_classified = self.cancel_on_classified;
        let callbacks = ScanCallbacks::new()
            .on_progress({
                let events = Arc::clone(&events);
                let handle = Arc::clone(&handle);
                let fired = Arc::clone(&fired);
                move |root_id, progress| {
                    events
                        .progress
                        .lock()
                        .unwrap()
                        .push((progress.processed, progress.total));
                    let Some(orchestrator) = handle.get().and_then(Weak::upgrade) else {
                        return;
                    };
                    if pause_at == Some(progress.processed) && !fired.swap(true, Ordering::SeqCst) {
                        orchestrator.pause(root_id).expect("pause active run");
                    }
                    if cancel_at == Some(progress.processed) && !fired.swap(true, Ordering::SeqCst) {
                        orchestrator.cancel(root_id).expect("cancel active run");
                    }
                }
            })
            .on_file({
                let events = Arc::clone(&events);
                move |outcome| events.files.lock().unwrap().push(outcome.clone())
            })
            .on_classified({
                let events = Arc::clone(&events);
                let handle = Arc::clone(&handle);
                move |root_id, summary| {
                    events.classified.lock().unwrap().push(*summary);
                    if !cancel_on_classified {
                        return;
                    }
                    if let Some(orchestrator) = handle.get().and_then(Weak::upgrade) {
                        orchestrator.cancel(root_id).expect("cancel active run");
                    }
                }
            })
            .on_paused({
                let events = Arc::clone(&events);
                move |state| events.paused.lock().unwrap().push(state.clone())
            })
            .on_resumed({
                let events = Arc::clone(&events);
                move |state| events.resumed.lock().unwrap().push(state.clone())
            })
            .on_completed({
                let events = Arc::clone(&events);
                move |state| events.completed.lock().unwrap().push(state.clone())
            })
            .on_cancelled({
                let events = Arc::clone(&events);
                move |state| events.cancelled.lock().unwrap().push(state.clone())
            })
            .on_error({
                let events = Arc::clone(&events);
                move |_, message| events.errors.lock().unwrap().push(message.to_string())
            });

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryScanStore::new()));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::clone(&store),
            Arc::new(self.processor),
            self.options,
            callbacks,
        ));
        let _ = handle.set(Arc::downgrade(&orchestrator));

        let temp = tempfile::tempdir().expect("tempdir");
        let root_path = temp.path().join("library");
        std::fs::create_dir_all(&root_path).expect("create library");
        let root = MediaRoot::new(root_path);
        Harness {
            orchestrator,
            events,
            store,
            root,
            _temp: temp,
        }
    }
}

pub struct Harness {
    pub orchestrator: Arc<ScanOrchestrator>,
    pub events: Arc<Events>,
    pub store: Arc<dyn ScanStore>,
    pub root: MediaRoot,
    _temp: TempDir,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            options: ScanOptions::default()
                .with_segment_size(10)
                .with_concurrency(4),
            processor: ScriptedProcessor::default(),
            store: None,
            pause_at: None,
            cancel_at: None,
            cancel_on_classified: false,
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    pub fn wait(&self) {
        assert!(
            self.orchestrator.wait_idle(&self.root.id, WAIT),
            "scan did not settle in time"
        );
    }

    pub fn state(&self) -> ScanState {
        self.orchestrator
            .status(&self.root.id)
            .expect("load state")
            .expect("state saved")
    }
}

/// Memory store whose calls can be made to fail on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryScanStore,
    /// Number of upcoming `records` calls that fail.
    pub failing_record_loads: AtomicUsize,
    /// Number of upcoming `save_state` calls that fail.
    pub failing_saves: AtomicUsize,
    /// Fail every save of a state that is still scanning.
    pub fail_checkpoints: AtomicBool,
    pub fail_upserts: AtomicBool,
    pub failed_writes: AtomicUsize,
}

impl FlakyStore {
    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn failed(&self) -> Result<(), StoreError> {
        self.failed_writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Busy)
    }
}

impl ScanStore for FlakyStore {
    fn save_state(&self, state: &ScanState) -> Result<(), StoreError> {
        if Self::take(&self.failing_saves) {
            return self.failed();
        }
        if state.status == ScanStatus::Scanning && self.fail_checkpoints.load(Ordering::SeqCst) {
            return self.failed();
        }
        self.inner.save_state(state)
    }

    fn load_state(&self, root_id: &RootId) -> Result<Option<ScanState>, StoreError> {
        self.inner.load_state(root_id)
    }

    fn list_incomplete(&self) -> Result<Vec<ScanState>, StoreError> {
        self.inner.list_incomplete()
    }

    fn records(&self, root_id: &RootId) -> Result<Vec<ScanStateRecord>, StoreError> {
        if Self::take(&self.failing_record_loads) {
            return Err(StoreError::Busy);
        }
        self.inner.records(root_id)
    }

    fn upsert_record(&self, record: &ScanStateRecord) -> Result<(), StoreError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return self.failed();
        }
        self.inner.upsert_record(record)
    }

    fn delete_records(&self, root_id: &RootId, paths: &[PathBuf]) -> Result<usize, StoreError> {
        self.inner.delete_records(root_id, paths)
    }

    fn save_directories(
        &self,
        root_id: &RootId,
        directories: &BTreeSet<PathBuf>,
    ) -> Result<(), StoreError> {
        self.inner.save_directories(root_id, directories)
    }

    fn directories(&self, root_id: &RootId) -> Result<BTreeSet<PathBuf>, StoreError> {
        self.inner.directories(root_id)
    }
}
