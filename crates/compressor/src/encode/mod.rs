//! Encoding modules for the video compressor
//!
//! A [`Transcoder`] turns one [`FileTask`] into a [`TerminalStatus`]. The
//! production implementation runs the external tool; tests substitute doubles.

pub mod ffmpeg;
pub mod params;

pub use ffmpeg::{build_tool_command, ToolInvoker, DEFAULT_LINE_WAIT};
pub use params::{EncodeParameters, PRESET};

use crate::cancel::CancelToken;
use crate::events::{EventSender, StatusEvent};
use crate::job::FileTask;
use std::path::PathBuf;

/// How a single file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The tool finished and the output is at this path
    Completed(PathBuf),
    /// Cancelled mid-file; the partial output was removed
    Stopped,
    /// The tool could not be run or reported failure
    Failed(String),
}

impl TerminalStatus {
    /// Status event announcing this outcome
    pub fn to_event(&self) -> StatusEvent {
        match self {
            TerminalStatus::Completed(path) => StatusEvent::Completed {
                output_name: display_name(path),
            },
            TerminalStatus::Stopped => StatusEvent::Stopped,
            TerminalStatus::Failed(message) => StatusEvent::Error(message.clone()),
        }
    }
}

/// Runs one file through a transcoding backend.
///
/// Implementations must check `cancel` while the file is in flight, forward
/// diagnostic lines through `events.log`, and never panic on tool failure.
pub trait Transcoder: Send + Sync {
    fn transcode(
        &self,
        task: &FileTask,
        params: &EncodeParameters,
        cancel: &CancelToken,
        events: &EventSender,
    ) -> TerminalStatus;
}

/// File name component for status messages, falling back to the full path
pub(crate) fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
