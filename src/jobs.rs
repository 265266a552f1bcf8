//! Job queue: the single source of truth for every image in the session.
//!
//! Each accepted upload becomes one [`ImageJob`] that walks this state machine:
//!
//! ```text
//!   Queued ──► Processing ──► Done
//!                  │  ▲
//!                  ▼  │
//!                 Failed
//! ```
//!
//! `Processing` is entered from `Queued` or `Failed` only, and left only for
//! `Done` or `Failed`. The output image and the error message live inside
//! the state variants, so a job cannot be `Done` without an image or carry a
//! message while not `Failed`.
//!
//! Queue-wide settings (target ratio, download format) and the top-level
//! notice banner live here too. The queue is shared as [`SharedQueue`]; hold
//! the lock only for quick reads and updates, never across an `.await`.

use crate::intake::{AcceptedFile, SourceFile};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::types::{DEFAULT_ASPECT_RATIO, OutputFormat};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub type JobId = Uuid;

pub type SharedQueue = Arc<Mutex<JobQueue>>;

/// Coarse status, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum JobState {
    Queued,
    Processing,
    Done { image: Vec<u8> },
    Failed { message: String },
}

impl JobState {
    fn status(&self) -> JobStatus {
        match self {
            Self::Queued => JobStatus::Queued,
            Self::Processing => JobStatus::Processing,
            Self::Done { .. } => JobStatus::Done,
            Self::Failed { .. } => JobStatus::Error,
        }
    }
}

/// Requested change to a job's state.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    Processing,
    /// Fully composited PNG bytes.
    Done(Vec<u8>),
    Failed(String),
}

impl JobUpdate {
    fn target(&self) -> JobStatus {
        match self {
            Self::Processing => JobStatus::Processing,
            Self::Done(_) => JobStatus::Done,
            Self::Failed(_) => JobStatus::Error,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

/// One user image and its processing state.
#[derive(Debug)]
pub struct ImageJob {
    id: JobId,
    source: SourceFile,
    preview: PreviewHandle,
    state: JobState,
}

impl ImageJob {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Original file name as uploaded.
    pub fn name(&self) -> &str {
        &self.source.name
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Composited output, present only when `Done`.
    pub fn generated_image(&self) -> Option<&[u8]> {
        match &self.state {
            JobState::Done { image } => Some(image),
            _ => None,
        }
    }

    /// Failure message, present only when `Error`.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self.state, JobState::Queued | JobState::Failed { .. })
    }
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.done + self.error
    }
}

/// A `Done` job's name and output, detached from the queue for export.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub id: JobId,
    pub name: String,
    pub image: Vec<u8>,
}

pub struct JobQueue {
    jobs: Vec<ImageJob>,
    registry: PreviewRegistry,
    selected_ratio: String,
    format: OutputFormat,
    notice: Option<String>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_registry(PreviewRegistry::new())
    }

    pub fn with_registry(registry: PreviewRegistry) -> Self {
        Self {
            jobs: Vec::new(),
            registry,
            selected_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            format: OutputFormat::default(),
            notice: None,
        }
    }

    pub fn into_shared(self) -> SharedQueue {
        Arc::new(Mutex::new(self))
    }

    /// Append one `Queued` job per accepted file, in order.
    pub fn enqueue(&mut self, files: Vec<AcceptedFile>) -> Vec<JobId> {
        files
            .into_iter()
            .map(|file| {
                let id = Uuid::new_v4();
                self.jobs.push(ImageJob {
                    id,
                    preview: self.registry.acquire(file.image),
                    source: file.source,
                    state: JobState::Queued,
                });
                id
            })
            .collect()
    }

    /// Drop a job in any state, releasing its preview.
    pub fn remove(&mut self, id: JobId) -> Result<(), QueueError> {
        let index = self.index_of(id)?;
        let job = self.jobs.remove(index);
        log::debug!("removed job {} ({})", job.id, job.status());
        Ok(())
    }

    /// Clear every job and restore default settings.
    pub fn reset(&mut self) {
        self.jobs.clear();
        self.selected_ratio = DEFAULT_ASPECT_RATIO.to_string();
        self.format = OutputFormat::default();
        self.notice = None;
    }

    pub fn update_status(&mut self, id: JobId, update: JobUpdate) -> Result<(), QueueError> {
        let index = self.index_of(id)?;
        let job = &mut self.jobs[index];
        let from = job.state.status();
        let to = update.target();
        let allowed = match to {
            JobStatus::Processing => matches!(from, JobStatus::Queued | JobStatus::Error),
            JobStatus::Done | JobStatus::Error => from == JobStatus::Processing,
            JobStatus::Queued => false,
        };
        if !allowed {
            return Err(QueueError::InvalidTransition { from, to });
        }

        job.state = match update {
            JobUpdate::Processing => JobState::Processing,
            JobUpdate::Done(image) => JobState::Done { image },
            JobUpdate::Failed(message) => JobState::Failed { message },
        };
        log::debug!("job {id}: {from} -> {to}");
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<&ImageJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// All jobs in insertion order.
    pub fn jobs(&self) -> &[ImageJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Ids of `Queued` and `Error` jobs in insertion order.
    pub fn eligible(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|j| j.is_eligible())
            .map(|j| j.id)
            .collect()
    }

    /// Snapshot of every `Done` job in insertion order.
    pub fn completed(&self) -> Vec<CompletedJob> {
        self.jobs
            .iter()
            .filter_map(|j| {
                j.generated_image().map(|image| CompletedJob {
                    id: j.id,
                    name: j.source.name.clone(),
                    image: image.to_vec(),
                })
            })
            .collect()
    }

    pub fn has_completed(&self) -> bool {
        self.jobs.iter().any(|j| j.status() == JobStatus::Done)
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in &self.jobs {
            match job.status() {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Done => counts.done += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Set the queue-wide target ratio. Validation happens per job in the pipeline.
    pub fn select_ratio(&mut self, ratio: impl Into<String>) {
        self.selected_ratio = ratio.into();
    }

    pub fn selected_ratio(&self) -> &str {
        &self.selected_ratio
    }

    pub fn select_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Top-level banner, e.g. an export that produced nothing.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    fn index_of(&self, id: JobId) -> Result<usize, QueueError> {
        self.jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or(QueueError::NotFound(id))
    }
}
