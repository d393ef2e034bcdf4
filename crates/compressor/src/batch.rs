//! Batch runner: walks a source folder and transcodes eligible files one at a time.

use crate::encode::{display_name, TerminalStatus, Transcoder};
use crate::events::{EventSender, StatusEvent};
use crate::job::{BatchJob, FileTask};
use crate::unique_path::resolve_unique_path;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

/// Video file name suffixes accepted by the runner (case-insensitive matching).
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mkv", ".mov"];

/// Outcome counts for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files handed to the transcoder
    pub scheduled: usize,
    pub completed: usize,
    pub failed: usize,
    /// The run ended because its cancel token was set
    pub cancelled: bool,
    /// The destination could not be created or the source could not be listed
    pub setup_failed: bool,
}

impl BatchSummary {
    /// True when every scheduled file completed and setup succeeded
    pub fn is_success(&self) -> bool {
        !self.setup_failed && self.failed == 0
    }
}

/// Checks if a file name ends with a video extension (ASCII case-insensitive).
///
/// Works on the raw name, so names that are not valid UTF-8 are matched too.
pub fn is_eligible_name<S: AsRef<OsStr> + ?Sized>(name: &S) -> bool {
    let bytes = name.as_ref().as_encoded_bytes();
    VIDEO_EXTENSIONS.iter().any(|ext| {
        bytes.len() >= ext.len()
            && bytes[bytes.len() - ext.len()..].eq_ignore_ascii_case(ext.as_bytes())
    })
}

/// Lists the eligible files directly inside `source_dir`.
///
/// Not recursive. Order is the directory listing order, which is not stable
/// across platforms. Entries that are not regular files are skipped.
pub fn eligible_files(source_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;

        if !is_eligible_name(&entry.file_name()) {
            continue;
        }

        // file_type() does not follow symlinks
        let is_file = fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }

    Ok(files)
}

/// Execute a batch run on the calling thread.
///
/// This function:
/// - Creates the destination folder (and parents) if missing
/// - Lists eligible files in the source folder
/// - For each file, stops if the job's token is cancelled, otherwise resolves
///   a collision-free output path, announces the mapping, and hands the file
///   to `transcoder`, reporting its terminal status
///
/// Files are processed strictly one after another. Setup problems are
/// reported as `Error` status events; nothing is returned as an error.
pub fn run_batch<T: Transcoder + ?Sized>(
    job: &BatchJob,
    transcoder: &T,
    events: &EventSender,
) -> BatchSummary {
    let span = info_span!("batch", run = %job.id);
    let _enter = span.enter();

    let mut summary = BatchSummary::default();
    let cancel = job.cancel_token();

    if let Err(e) = fs::create_dir_all(&job.dest_dir) {
        warn!("Cannot create {}: {}", job.dest_dir.display(), e);
        events.status(StatusEvent::Error(format!(
            "Cannot create destination folder {}: {}",
            job.dest_dir.display(),
            e
        )));
        summary.setup_failed = true;
        return summary;
    }

    let inputs = match eligible_files(&job.source_dir) {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!("Cannot list {}: {}", job.source_dir.display(), e);
            events.status(StatusEvent::Error(format!(
                "Cannot read source folder {}: {}",
                job.source_dir.display(),
                e
            )));
            summary.setup_failed = true;
            return summary;
        }
    };

    info!(
        "Found {} eligible file(s) in {}",
        inputs.len(),
        job.source_dir.display()
    );

    for input_path in inputs {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let input_name = display_name(&input_path);
        let output_path = resolve_unique_path(&job.dest_dir.join(&input_name));
        let task = FileTask::new(input_path, output_path);

        events.status(StatusEvent::Processing {
            input_name: input_name.clone(),
            output_name: display_name(&task.output_path),
        });
        info!(
            "Processing {} -> {}",
            task.input_path.display(),
            task.output_path.display()
        );
        summary.scheduled += 1;

        let status = transcoder.transcode(&task, &job.params, cancel, events);
        events.status(status.to_event());

        match status {
            TerminalStatus::Completed(_) => summary.completed += 1,
            TerminalStatus::Failed(message) => {
                warn!("{} failed: {}", input_name, message);
                summary.failed += 1;
            }
            TerminalStatus::Stopped => {
                summary.cancelled = true;
                break;
            }
        }
    }

    info!(
        "Batch finished: {} completed, {} failed{}",
        summary.completed,
        summary.failed,
        if summary.cancelled { ", cancelled" } else { "" }
    );
    summary
}
