//! Resumable, concurrency-bounded scan engine.
//!
//! [`ScanOrchestrator`] owns one background run per root. A run walks the root,
//! optionally classifies the listing against the last manifest, then feeds the
//! remaining files through a [`WorkerPool`] in fixed-size segments, persisting
//! a [`ScanState`] checkpoint after each one so an interrupted scan can pick up
//! exactly where it stopped.

mod callbacks;
pub mod cancel;
pub mod classifier;
mod options;
mod orchestrator;
pub mod pool;
pub mod processor;
mod run;
mod state;
mod tracker;

pub use callbacks::ScanCallbacks;
pub use cancel::{CancelToken, StopReason};
pub use classifier::{ChangeSet, ChangeSummary, classify};
pub use options::{DEFAULT_SEGMENT_SIZE, ScanOptions};
pub use orchestrator::{ResumeOutcome, ScanControlError, ScanOrchestrator};
pub use pool::{PoolOutcome, PoolReport, WorkError, WorkerPool, default_concurrency};
pub use processor::{
    BackgroundJob, ExtractError, FileProcessor, JobPayload, JobQueue, JobQueueError, JobType,
    MediaAsset, MediaExtractor, MediaFileProcessor, MediaMetadata, NullExtractor, ProcessContext,
    ProcessError,
};
pub use state::{FileOutcome, ScanMode, ScanProgress, ScanState, ScanStatus};
pub use tracker::RunId;
