//! Startup checks module for the video compressor
//!
//! Verifies that the configured transcoding tool can be executed before a
//! batch run is started.

use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Transcoding tool not available: {0}")]
    ToolUnavailable(String),
}

/// Check that the tool runs by executing `<tool> -version`
///
/// Fails if the tool cannot be spawned or exits with a non-zero status.
pub fn check_tool_available(tool_path: &Path) -> Result<(), StartupError> {
    let status = Command::new(tool_path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            StartupError::ToolUnavailable(format!(
                "{} -version failed; is it installed and in PATH? Error: {}",
                tool_path.display(),
                e
            ))
        })?;

    if !status.success() {
        return Err(StartupError::ToolUnavailable(format!(
            "{} -version exited with {}",
            tool_path.display(),
            status
        )));
    }

    Ok(())
}
