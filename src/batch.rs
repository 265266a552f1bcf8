//! Batch runner: drives eligible jobs through the pipeline, one at a time.
//!
//! A run snapshots the eligible jobs (`Queued` or `Error`) and the target
//! ratio when it starts, then processes each job exactly once in insertion
//! order, sleeping [`BatchSettings::request_delay`] between consecutive
//! requests. A failing job is recorded on the job and the run moves on.
//!
//! Only one run may be active per runner. A second [`BatchRunner::run_all`]
//! or [`BatchRunner::run_one`] while a run is in flight returns
//! [`BatchOutcome::AlreadyRunning`] without touching the queue. The flag is
//! released by a guard, so a cancelled or panicking run cannot leave it set.
//!
//! Jobs can be removed while their request is in flight. The result that
//! comes back later no longer has a job to land on and is discarded.
//!
//! Progress is reported as [`BatchEvent`]s over an optional channel, for a
//! printer thread to render.

use crate::imaging::MAX_DIMENSION;
use crate::jobs::{JobId, JobUpdate, QueueError, SharedQueue};
use crate::pipeline;
use crate::service::{EXPANSION_PROMPT, ImageExpander};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Pause between consecutive requests within one run.
    pub request_delay: Duration,
    pub max_dimension: u32,
    pub prompt: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            max_dimension: MAX_DIMENSION,
            prompt: EXPANSION_PROMPT.to_string(),
        }
    }
}

/// Progress of a run, one event per job milestone.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Job moved to processing. `index` is zero-based within the run.
    Started {
        id: JobId,
        name: String,
        index: usize,
        total: usize,
    },
    Finished { id: JobId, name: String },
    Failed {
        id: JobId,
        name: String,
        message: String,
    },
    /// The job was removed before its result arrived.
    Discarded { id: JobId, name: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed(BatchSummary),
    AlreadyRunning,
    NothingQueued,
    /// `run_one` target is unknown, processing, or already done.
    NotEligible,
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BatchRunner {
    queue: SharedQueue,
    expander: Arc<dyn ImageExpander>,
    settings: BatchSettings,
    running: AtomicBool,
    events: Option<Sender<BatchEvent>>,
}

impl BatchRunner {
    pub fn new(queue: SharedQueue, expander: Arc<dyn ImageExpander>, settings: BatchSettings) -> Self {
        Self {
            queue,
            expander,
            settings,
            running: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Sender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    /// Process every job that is queued or failed right now.
    pub async fn run_all(&self) -> BatchOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            log::debug!("batch already running, ignoring request");
            return BatchOutcome::AlreadyRunning;
        };

        let (ids, ratio) = {
            let queue = self.queue.lock();
            (queue.eligible(), queue.selected_ratio().to_string())
        };
        if ids.is_empty() {
            return BatchOutcome::NothingQueued;
        }

        log::info!("starting batch of {} image(s) at {ratio}", ids.len());
        let total = ids.len();
        let mut summary = BatchSummary::default();
        for (index, id) in ids.into_iter().enumerate() {
            if self.queue.lock().get(id).is_none() {
                log::debug!("job {id} removed before its turn");
                continue;
            }
            // The delay only separates requests; nothing precedes the first.
            if summary.attempted > 0 && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            self.process(id, &ratio, index, total, &mut summary).await;
        }
        log::info!(
            "batch finished: {} succeeded, {} failed, {} discarded",
            summary.succeeded,
            summary.failed,
            summary.discarded
        );
        BatchOutcome::Completed(summary)
    }

    /// Process a single queued or failed job (per-image retry).
    pub async fn run_one(&self, id: JobId) -> BatchOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return BatchOutcome::AlreadyRunning;
        };

        let ratio = {
            let queue = self.queue.lock();
            if !queue.get(id).is_some_and(|job| job.is_eligible()) {
                return BatchOutcome::NotEligible;
            }
            queue.selected_ratio().to_string()
        };

        let mut summary = BatchSummary::default();
        self.process(id, &ratio, 0, 1, &mut summary).await;
        BatchOutcome::Completed(summary)
    }

    async fn process(
        &self,
        id: JobId,
        ratio: &str,
        index: usize,
        total: usize,
        summary: &mut BatchSummary,
    ) {
        let (name, original) = {
            let mut queue = self.queue.lock();
            let Some(job) = queue.get(id) else {
                log::debug!("job {id} removed before it started");
                return;
            };
            let claimed = (job.name().to_string(), job.preview().image());
            if let Err(e) = queue.update_status(id, JobUpdate::Processing) {
                log::debug!("skipping job {id}: {e}");
                return;
            }
            claimed
        };

        summary.attempted += 1;
        self.emit(BatchEvent::Started {
            id,
            name: name.clone(),
            index,
            total,
        });

        let result = pipeline::expand_image(
            self.expander.as_ref(),
            &original,
            ratio,
            self.settings.max_dimension,
            &self.settings.prompt,
        )
        .await;

        let (update, event) = match result {
            Ok(png) => (
                JobUpdate::Done(png),
                BatchEvent::Finished {
                    id,
                    name: name.clone(),
                },
            ),
            Err(e) => {
                let message = e.to_string();
                (
                    JobUpdate::Failed(message.clone()),
                    BatchEvent::Failed {
                        id,
                        name: name.clone(),
                        message,
                    },
                )
            }
        };

        let applied = self.queue.lock().update_status(id, update);
        match applied {
            Ok(()) => {
                match &event {
                    BatchEvent::Failed { message, .. } => {
                        log::warn!("{name}: {message}");
                        summary.failed += 1;
                    }
                    _ => summary.succeeded += 1,
                }
                self.emit(event);
            }
            Err(QueueError::NotFound(_)) => {
                log::debug!("discarding result for removed job {id} ({name})");
                summary.discarded += 1;
                self.emit(BatchEvent::Discarded { id, name });
            }
            Err(e) => log::warn!("could not record result for {name}: {e}"),
        }
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}
