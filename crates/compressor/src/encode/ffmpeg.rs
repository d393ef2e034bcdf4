//! External tool invocation
//!
//! Runs the configured transcoding tool (ffmpeg by default) for one file,
//! forwarding its diagnostic stream line by line and honouring cancellation
//! between lines.

use super::{EncodeParameters, TerminalStatus, Transcoder};
use crate::cancel::CancelToken;
use crate::events::EventSender;
use crate::job::FileTask;
use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest wait for the next diagnostic line before the cancel token is
/// checked again
pub const DEFAULT_LINE_WAIT: Duration = Duration::from_millis(250);

/// Number of trailing diagnostic lines quoted in a failure message
const FAILURE_TAIL_LINES: usize = 3;

/// Build the tool command for one file
///
/// Creates a Command equivalent to
/// `<tool> -i <input> -c:v <codec> -crf <quality> -preset slow <output>`.
///
/// On unix the tool gets its own process group, so a terminal Ctrl-C reaches
/// only this process and the tool stops through the cancel token alone.
pub fn build_tool_command(params: &EncodeParameters, input: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(params.tool_path());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    cmd.arg("-i").arg(input);
    cmd.arg("-c:v").arg(params.codec().encoder_name());
    cmd.arg("-crf").arg(params.quality().to_string());
    cmd.arg("-preset").arg(params.preset());
    cmd.arg(output);

    cmd
}

/// Production [`Transcoder`] backed by a child process
#[derive(Debug, Clone)]
pub struct ToolInvoker {
    line_wait: Duration,
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self {
            line_wait: DEFAULT_LINE_WAIT,
        }
    }
}

impl ToolInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound on how long a silent tool can delay noticing a cancel request
    pub fn with_line_wait(line_wait: Duration) -> Self {
        Self {
            line_wait: line_wait.max(Duration::from_millis(1)),
        }
    }

    pub fn line_wait(&self) -> Duration {
        self.line_wait
    }
}

impl Transcoder for ToolInvoker {
    fn transcode(
        &self,
        task: &FileTask,
        params: &EncodeParameters,
        cancel: &CancelToken,
        events: &EventSender,
    ) -> TerminalStatus {
        let tool = params.tool_path().display().to_string();
        let mut cmd = build_tool_command(params, &task.input_path, &task.output_path);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!("Spawning {:?}", cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", tool, e);
                return TerminalStatus::Failed(format!("Failed to start {}: {}", tool, e));
            }
        };

        let Some(stderr) = child.stderr.take() else {
            terminate(&mut child);
            return TerminalStatus::Failed(format!("{} stderr was not captured", tool));
        };

        let (line_tx, line_rx) = mpsc::channel();
        let reader = match thread::Builder::new()
            .name("tool-stderr".to_string())
            .spawn(move || forward_lines(stderr, line_tx))
        {
            Ok(handle) => handle,
            Err(e) => {
                terminate(&mut child);
                return TerminalStatus::Failed(format!("Failed to read {} output: {}", tool, e));
            }
        };

        let mut tail: VecDeque<String> = VecDeque::with_capacity(FAILURE_TAIL_LINES);
        loop {
            if cancel.is_cancelled() {
                info!("Cancelling {}", task.input_path.display());
                terminate(&mut child);
                remove_partial_output(&task.output_path);
                return TerminalStatus::Stopped;
            }

            match line_rx.recv_timeout(self.line_wait) {
                Ok(line) => {
                    if tail.len() == FAILURE_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                    events.log(line);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let _ = reader.join();

        match child.wait() {
            Ok(status) if status.success() => {
                TerminalStatus::Completed(task.output_path.clone())
            }
            Ok(status) => {
                warn!("{} exited with {} for {}", tool, status, task.input_path.display());
                remove_partial_output(&task.output_path);
                let mut message = format!("{} exited with {}", tool, status);
                if let Some(last) = tail.back() {
                    message.push_str(&format!(" ({})", last));
                }
                TerminalStatus::Failed(message)
            }
            Err(e) => TerminalStatus::Failed(format!("Failed to wait for {}: {}", tool, e)),
        }
    }
}

/// Kill the child and reap it
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        // InvalidInput means it already exited
        if e.kind() != ErrorKind::InvalidInput {
            warn!("Failed to kill tool process: {}", e);
        }
    }
    let _ = child.wait();
}

fn remove_partial_output(path: &Path) {
    if path.exists() {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed partial output {}", path.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
        }
    }
}

/// Split a diagnostic stream into trimmed, non-empty lines.
///
/// Both `\n` and `\r` end a line: ffmpeg redraws its progress line with
/// carriage returns only. Stops when the stream ends or the receiver is gone.
pub(crate) fn forward_lines<R: Read>(stream: R, tx: Sender<String>) {
    let mut reader = BufReader::new(stream);
    let mut line: Vec<u8> = Vec::new();

    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(_) => break,
        };
        if buf.is_empty() {
            break;
        }

        let len = buf.len();
        for &byte in buf {
            if byte == b'\n' || byte == b'\r' {
                if !send_line(&mut line, &tx) {
                    return;
                }
            } else {
                line.push(byte);
            }
        }
        reader.consume(len);
    }

    send_line(&mut line, &tx);
}

/// Returns false once the receiver has hung up
fn send_line(line: &mut Vec<u8>, tx: &Sender<String>) -> bool {
    if line.is_empty() {
        return true;
    }
    let text = String::from_utf8_lossy(line).trim().to_string();
    line.clear();
    if text.is_empty() {
        return true;
    }
    tx.send(text).is_ok()
}
