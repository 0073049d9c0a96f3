//! Per-file work: hash a file, then describe it inline or hand the expensive
//! parts to a background job queue.

use std::{
    path::{Path, PathBuf},
    sync::mpsc,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::state::ScanMode;
use crate::media_roots::{FastHash, FastHasher, FileReference, HashError, MediaRoot, RootId};

/// Technical description of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl MediaMetadata {
    /// Stand-in used until real metadata is available.
    pub fn placeholder() -> Self {
        Self {
            duration_seconds: 0.0,
            width: 0,
            height: 0,
            codec: "unknown".to_string(),
        }
    }
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Catalog entry produced for one scanned file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub relative_path: PathBuf,
    pub file_name: String,
    pub fast_hash: FastHash,
    pub file_size: u64,
    pub last_modified_ns: i64,
    pub metadata: MediaMetadata,
    /// Encoded thumbnail bytes; kept in memory only.
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    /// True while metadata is the placeholder.
    pub placeholder: bool,
    /// Relative path of an earlier file with the same content, if any.
    #[serde(default)]
    pub duplicate_of: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Metadata extraction failed for {path}: {reason}")]
    Failed { path: PathBuf, reason: String },
    #[error("Extraction not supported for {0}")]
    Unsupported(PathBuf),
}

/// Metadata and thumbnail extraction provided by the host.
pub trait MediaExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<MediaMetadata, ExtractError>;
    fn thumbnail(&self, path: &Path) -> Result<Vec<u8>, ExtractError>;
}

/// Extractor that never produces anything, so every asset is a placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullExtractor;

impl MediaExtractor for NullExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata, ExtractError> {
        Err(ExtractError::Unsupported(path.to_path_buf()))
    }

    fn thumbnail(&self, path: &Path) -> Result<Vec<u8>, ExtractError> {
        Err(ExtractError::Unsupported(path.to_path_buf()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    ExtractMetadata,
    GenerateThumbnail,
}

impl JobType {
    /// Higher runs first.
    pub fn default_priority(&self) -> u8 {
        match self {
            JobType::ExtractMetadata => 10,
            JobType::GenerateThumbnail => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub root_id: RootId,
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub fast_hash: FastHash,
}

/// Deferred work for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub job_type: JobType,
    pub item_id: String,
    pub payload: JobPayload,
    pub priority: u8,
}

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("Job queue is closed")]
    Closed,
    #[error("Job queue rejected job: {0}")]
    Rejected(String),
}

/// Sink for deferred extraction work.
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: BackgroundJob) -> Result<(), JobQueueError>;
}

impl JobQueue for mpsc::Sender<BackgroundJob> {
    fn enqueue(&self, job: BackgroundJob) -> Result<(), JobQueueError> {
        self.send(job).map_err(|_| JobQueueError::Closed)
    }
}

/// Errors that fail a single file.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error("File vanished before processing: {0}")]
    Missing(PathBuf),
    #[error("{0}")]
    Failed(String),
}

/// What a processor needs to know about the run it is working for.
pub struct ProcessContext<'a> {
    pub root: &'a MediaRoot,
    pub mode: ScanMode,
    /// Present when expensive extraction should be deferred.
    pub jobs: Option<&'a dyn JobQueue>,
}

/// Turns one discovered file into a [`MediaAsset`].
pub trait FileProcessor: Send + Sync {
    fn process(
        &self,
        context: &ProcessContext<'_>,
        file: &FileReference,
    ) -> Result<MediaAsset, ProcessError>;
}

/// Default processor: fast hash, then extraction inline or through the queue.
pub struct MediaFileProcessor {
    hasher: FastHasher,
    extractor: Box<dyn MediaExtractor>,
}

impl MediaFileProcessor {
    pub fn new(hasher: FastHasher, extractor: Box<dyn MediaExtractor>) -> Self {
        Self { hasher, extractor }
    }

    fn describe_inline(&self, file: &FileReference) -> (MediaMetadata, Option<Vec<u8>>, bool) {
        let (metadata, placeholder) = match self.extractor.extract(&file.absolute_path) {
            Ok(metadata) => (metadata, false),
            Err(err) => {
                debug!(path = %file.absolute_path.display(), error = %err, "Using placeholder metadata");
                (MediaMetadata::placeholder(), true)
            }
        };
        let thumbnail = match self.extractor.thumbnail(&file.absolute_path) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                debug!(path = %file.absolute_path.display(), error = %err, "No thumbnail generated");
                None
            }
        };
        (metadata, thumbnail, placeholder)
    }
}

impl Default for MediaFileProcessor {
    fn default() -> Self {
        Self::new(FastHasher::default(), Box::new(NullExtractor))
    }
}

impl FileProcessor for MediaFileProcessor {
    fn process(
        &self,
        context: &ProcessContext<'_>,
        file: &FileReference,
    ) -> Result<MediaAsset, ProcessError> {
        if !file.absolute_path.is_file() {
            return Err(ProcessError::Missing(file.absolute_path.clone()));
        }
        let fast_hash = self.hasher.hash_file(&file.absolute_path)?;
        let id = Uuid::new_v4().to_string();
        let deferred = match (context.mode, context.jobs) {
            (ScanMode::Incremental, Some(queue)) => Some(queue),
            _ => None,
        };
        let (metadata, thumbnail, placeholder) = match deferred {
            Some(queue) => {
                enqueue_extraction(queue, &context.root.id, &id, file, &fast_hash);
                (MediaMetadata::placeholder(), None, true)
            }
            None => self.describe_inline(file),
        };
        Ok(MediaAsset {
            id,
            relative_path: file.relative_path.clone(),
            file_name: file_name_of(&file.relative_path),
            fast_hash,
            file_size: file.file_size,
            last_modified_ns: file.modified_ns,
            metadata,
            thumbnail,
            placeholder,
            duplicate_of: None,
        })
    }
}

fn enqueue_extraction(
    queue: &dyn JobQueue,
    root_id: &RootId,
    item_id: &str,
    file: &FileReference,
    fast_hash: &FastHash,
) {
    for job_type in [JobType::ExtractMetadata, JobType::GenerateThumbnail] {
        let job = BackgroundJob {
            job_type,
            item_id: item_id.to_string(),
            payload: JobPayload {
                root_id: root_id.clone(),
                relative_path: file.relative_path.clone(),
                absolute_path: file.absolute_path.clone(),
                fast_hash: fast_hash.clone(),
            },
            priority: job_type.default_priority(),
        };
        if let Err(err) = queue.enqueue(job) {
            warn!(
                path = %file.relative_path.display(),
                job = ?job_type,
                error = %err,
                "Failed to enqueue background job"
            );
        }
    }
}

fn file_name_of(relative_path: &Path) -> String {
    relative_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
