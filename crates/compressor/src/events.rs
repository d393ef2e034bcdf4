//! Event channel between the batch worker and whatever displays progress.
//!
//! Two independent FIFO queues carry status events and tool log lines from
//! the worker thread to the reporting side. They are the only way the worker
//! talks back; nothing is raised across the thread boundary. The reporting
//! side drains both queues on a fixed cadence, keeping only the latest status
//! and every log line.

use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

/// Default cadence at which the reporting side drains the queues
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Status text shown before any event arrives
pub const IDLE_STATUS: &str = "Idle";

/// Phase change reported by the batch runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A file is about to be handed to the tool
    Processing {
        input_name: String,
        output_name: String,
    },
    /// A file finished
    Completed { output_name: String },
    /// A file (or the run setup) failed
    Error(String),
    /// The in-flight file was cancelled
    Stopped,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Processing {
                input_name,
                output_name,
            } => write!(f, "Processing: {} -> {}", input_name, output_name),
            StatusEvent::Completed { output_name } => write!(f, "Completed: {}", output_name),
            StatusEvent::Error(message) => write!(f, "Error: {}", message),
            StatusEvent::Stopped => f.write_str("Processing Stopped"),
        }
    }
}

/// Creates the paired sender and receiver for one reporting pipeline
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (log_tx, log_rx) = mpsc::unbounded_channel();
    (
        EventSender { status_tx, log_tx },
        EventReceiver { status_rx, log_rx },
    )
}

/// Producer half, used from the worker thread.
///
/// Sending never blocks and needs no runtime. Events sent after the receiver
/// is gone are dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    log_tx: mpsc::UnboundedSender<String>,
}

impl EventSender {
    pub fn status(&self, event: StatusEvent) {
        if self.status_tx.send(event).is_err() {
            tracing::trace!("status receiver dropped");
        }
    }

    pub fn log(&self, line: impl Into<String>) {
        if self.log_tx.send(line.into()).is_err() {
            tracing::trace!("log receiver dropped");
        }
    }
}

/// Everything that arrived since the previous drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Last status event of the tick; earlier ones are superseded
    pub latest_status: Option<StatusEvent>,
    /// Every log line of the tick, oldest first
    pub log_lines: Vec<String>,
}

impl Progress {
    pub fn is_empty(&self) -> bool {
        self.latest_status.is_none() && self.log_lines.is_empty()
    }
}

/// Consumer half, owned by the reporting side
#[derive(Debug)]
pub struct EventReceiver {
    status_rx: mpsc::UnboundedReceiver<StatusEvent>,
    log_rx: mpsc::UnboundedReceiver<String>,
}

impl EventReceiver {
    /// Take every item currently queued without waiting for more
    pub fn drain(&mut self) -> Progress {
        let mut progress = Progress::default();
        while let Ok(event) = self.status_rx.try_recv() {
            progress.latest_status = Some(event);
        }
        while let Ok(line) = self.log_rx.try_recv() {
            progress.log_lines.push(line);
        }
        progress
    }

    /// Take the oldest queued status event, if any.
    ///
    /// For consumers that want every phase change rather than the latest one.
    pub fn try_next_status(&mut self) -> Option<StatusEvent> {
        self.status_rx.try_recv().ok()
    }
}

/// Display model: one current status line plus the full log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBoard {
    pub current_status: String,
    pub log: Vec<String>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            current_status: IDLE_STATUS.to_string(),
            log: Vec::new(),
        }
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, progress: &Progress) {
        if let Some(status) = &progress.latest_status {
            self.current_status = status.to_string();
        }
        self.log.extend(progress.log_lines.iter().cloned());
    }

    /// Forget the previous run's log, as when a new run starts
    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

/// Control handle for a running poller task
pub struct PollerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<EventReceiver>,
}

impl PollerHandle {
    /// Stop polling after one last drain and get the receiver back
    pub async fn stop(mut self) -> Result<EventReceiver, JoinError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start draining `receiver` every `interval` on the current tokio runtime.
///
/// `on_tick` is called for each non-empty drain. The task runs until
/// [`PollerHandle::stop`] is awaited or the handle is dropped.
pub fn spawn_poller<F>(
    mut receiver: EventReceiver,
    interval: Duration,
    mut on_tick: F,
) -> PollerHandle
where
    F: FnMut(Progress) + Send + 'static,
{
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let period = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let progress = receiver.drain();
                    if !progress.is_empty() {
                        on_tick(progress);
                    }
                }
                _ = &mut stop_rx => {
                    let progress = receiver.drain();
                    if !progress.is_empty() {
                        on_tick(progress);
                    }
                    break;
                }
            }
        }

        receiver
    });

    PollerHandle {
        stop_tx: Some(stop_tx),
        task,
    }
}
