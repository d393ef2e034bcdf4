//! Batch controller: starts, stops and awaits batch runs.
//!
//! At most one run is active per controller. Each run gets its own job and
//! cancel token and executes on a dedicated worker thread; progress flows
//! back only through the event channel.

use crate::batch::{run_batch, BatchSummary};
use crate::cancel::CancelToken;
use crate::config::{ConfigError, Settings};
use crate::encode::{ToolInvoker, Transcoder};
use crate::events::EventSender;
use crate::job::BatchJob;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Error type for controller operations
#[derive(Debug, Error)]
pub enum CompressorError {
    /// Settings are not usable; no run was created
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A run is still in progress
    #[error("A batch run is already in progress")]
    AlreadyRunning,

    /// The worker thread could not be started
    #[error("Failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread panicked
    #[error("Batch worker panicked")]
    WorkerPanicked,
}

/// A run that has been started and not yet awaited
struct ActiveRun {
    id: Uuid,
    cancel: CancelToken,
    worker: JoinHandle<BatchSummary>,
}

/// Front-end facing entry point for batch runs
pub struct Compressor {
    transcoder: Arc<dyn Transcoder>,
    events: EventSender,
    active: Option<ActiveRun>,
}

impl Compressor {
    /// Create a controller that runs the external tool
    pub fn new(events: EventSender) -> Self {
        Self::with_transcoder(ToolInvoker::new(), events)
    }

    /// Create a controller with a custom transcoding backend
    pub fn with_transcoder<T: Transcoder + 'static>(transcoder: T, events: EventSender) -> Self {
        Self {
            transcoder: Arc::new(transcoder),
            events,
            active: None,
        }
    }

    /// Validate `settings` and start a run in the background
    ///
    /// # Errors
    /// - `Config` if a folder is missing or a parameter is out of range
    /// - `AlreadyRunning` if the previous run has not finished
    pub fn start(&mut self, settings: &Settings) -> Result<Uuid, CompressorError> {
        if self.is_running() {
            return Err(CompressorError::AlreadyRunning);
        }
        let job = BatchJob::from_settings(settings)?;
        self.start_job(job)
    }

    /// Start a run for an already built job
    pub fn start_job(&mut self, job: BatchJob) -> Result<Uuid, CompressorError> {
        if self.is_running() {
            return Err(CompressorError::AlreadyRunning);
        }
        if let Some(previous) = self.active.take() {
            // Finished but never awaited
            if previous.worker.join().is_err() {
                warn!("Previous batch worker {} panicked", previous.id);
            }
        }

        let id = job.id;
        let cancel = job.cancel_token().clone();
        let transcoder = Arc::clone(&self.transcoder);
        let events = self.events.clone();

        info!(
            "Starting batch {}: {} -> {}",
            id,
            job.source_dir.display(),
            job.dest_dir.display()
        );

        let worker = thread::Builder::new()
            .name("batch-worker".to_string())
            .spawn(move || run_batch(&job, transcoder.as_ref(), &events))?;

        self.active = Some(ActiveRun { id, cancel, worker });
        Ok(id)
    }

    /// Ask the active run to stop. Front ends confirm with the user first.
    ///
    /// Returns false when there is nothing to stop.
    pub fn request_stop(&self) -> bool {
        match &self.active {
            Some(run) if !run.worker.is_finished() => {
                info!("Stop requested for batch {}", run.id);
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .map(|run| !run.worker.is_finished())
            .unwrap_or(false)
    }

    /// Id of the run started last, until it is awaited
    pub fn active_run_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|run| run.id)
    }

    /// Block until the current run ends and return its summary
    ///
    /// Returns `Ok(None)` when no run was started since the last wait.
    pub fn wait(&mut self) -> Result<Option<BatchSummary>, CompressorError> {
        match self.active.take() {
            Some(run) => run
                .worker
                .join()
                .map(Some)
                .map_err(|_| CompressorError::WorkerPanicked),
            None => Ok(None),
        }
    }
}
