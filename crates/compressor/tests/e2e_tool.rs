//! End-to-end tests running the real tool invoker against small shell
//! scripts that behave like the transcoding tool.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use video_compressor::{
    event_channel, run_batch, spawn_poller, BatchJob, CancelToken, Codec, Compressor,
    EncodeParameters, EventReceiver, FileTask, Settings, StatusBoard, TerminalStatus,
    ToolInvoker, Transcoder,
};

/// Scripts are written and executed under this lock so no other test forks
/// while a script file is still open for writing ("text file busy").
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Copies the input to the output (last argument) and chatters on stderr
const COPYING_TOOL: &str = r#"#!/bin/sh
for last; do :; done
echo "Input #0, from '$2':" >&2
printf 'frame=    1 fps=0.0\rframe=    2 fps=0.0\n' >&2
cp "$2" "$last"
echo "video:1kB audio:0kB" >&2
exit 0
"#;

/// Writes a partial output then fails
const FAILING_TOOL: &str = r#"#!/bin/sh
for last; do :; done
echo "partial" > "$last"
echo "Unknown encoder '$4'" >&2
exit 1
"#;

/// Writes a partial output and keeps reporting progress forever
const ENDLESS_TOOL: &str = r#"#!/bin/sh
for last; do :; done
echo "partial" > "$last"
i=0
while true; do
  i=$((i + 1))
  echo "frame=$i" >&2
  sleep 0.02
done
"#;

/// Reports its own pid and process group, then copies like COPYING_TOOL
const GROUP_REPORTING_TOOL: &str = r#"#!/bin/sh
for last; do :; done
read -r pid comm state ppid pgrp rest < /proc/$$/stat
echo "pid=$pid pgrp=$pgrp" >&2
cp "$2" "$last"
"#;

/// Writes a partial output and then never says anything
const SILENT_TOOL: &str = r#"#!/bin/sh
for last; do :; done
echo "partial" > "$last"
exec sleep 30
"#;

fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn params(tool: &Path) -> EncodeParameters {
    EncodeParameters::new(Codec::H265, 28, tool).unwrap()
}

fn statuses(rx: &mut EventReceiver) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(event) = rx.try_next_status() {
        out.push(event.to_string());
    }
    out
}

struct Fixture {
    _root: TempDir,
    tools: PathBuf,
    source: PathBuf,
    dest: PathBuf,
}

fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let tools = root.path().join("bin");
    let source = root.path().join("in");
    let dest = root.path().join("out");
    fs::create_dir_all(&tools).unwrap();
    fs::create_dir_all(&source).unwrap();
    Fixture {
        tools,
        source,
        dest,
        _root: root,
    }
}

#[test]
fn batch_with_successful_tool() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", COPYING_TOOL);
    fs::write(fx.source.join("clip.mov"), b"movie bytes").unwrap();
    fs::write(fx.source.join("readme.txt"), b"not a video").unwrap();

    let job = BatchJob::new(&fx.source, &fx.dest, params(&tool));
    let (tx, mut rx) = event_channel();
    let summary = run_batch(&job, &ToolInvoker::new(), &tx);

    assert_eq!(summary.completed, 1);
    assert_eq!(
        statuses(&mut rx),
        vec!["Processing: clip.mov -> clip.mov", "Completed: clip.mov"]
    );
    let logs = rx.drain().log_lines;
    assert!(logs.contains(&"frame=    2 fps=0.0".to_string()), "{:?}", logs);
    assert_eq!(logs.last().map(String::as_str), Some("video:1kB audio:0kB"));
    assert_eq!(fs::read(fx.dest.join("clip.mov")).unwrap(), b"movie bytes");
}

#[test]
fn batch_avoids_overwriting_existing_output() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", COPYING_TOOL);
    fs::write(fx.source.join("clip.mov"), b"new").unwrap();
    fs::create_dir_all(&fx.dest).unwrap();
    fs::write(fx.dest.join("clip.mov"), b"old").unwrap();

    let job = BatchJob::new(&fx.source, &fx.dest, params(&tool));
    let (tx, mut rx) = event_channel();
    run_batch(&job, &ToolInvoker::new(), &tx);

    assert_eq!(
        statuses(&mut rx),
        vec!["Processing: clip.mov -> clip_1.mov", "Completed: clip_1.mov"]
    );
    assert_eq!(fs::read(fx.dest.join("clip.mov")).unwrap(), b"old");
    assert_eq!(fs::read(fx.dest.join("clip_1.mov")).unwrap(), b"new");
}

#[test]
fn failing_tool_is_reported_per_file() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", FAILING_TOOL);
    fs::write(fx.source.join("a.mp4"), b"a").unwrap();
    fs::write(fx.source.join("b.avi"), b"b").unwrap();

    let job = BatchJob::new(&fx.source, &fx.dest, params(&tool));
    let (tx, mut rx) = event_channel();
    let summary = run_batch(&job, &ToolInvoker::new(), &tx);

    assert_eq!(summary.scheduled, 2);
    assert_eq!(summary.failed, 2);
    let errors: Vec<String> = statuses(&mut rx)
        .into_iter()
        .filter(|s| s.starts_with("Error: "))
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("exited with"), "{}", errors[0]);
    assert!(errors[0].contains("Unknown encoder 'libx265'"), "{}", errors[0]);
    // Incomplete outputs are not left behind
    assert!(!fx.dest.join("a.mp4").exists());
    assert!(!fx.dest.join("b.avi").exists());
}

#[test]
fn cancel_mid_stream_stops_and_cleans_up() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", ENDLESS_TOOL);
    fs::create_dir_all(&fx.dest).unwrap();
    let task = FileTask::new(fx.source.join("long.mkv"), fx.dest.join("long.mkv"));
    let params = params(&tool);

    let cancel = CancelToken::new();
    let (tx, mut rx) = event_channel();
    let worker = {
        let cancel = cancel.clone();
        let task = task.clone();
        thread::spawn(move || ToolInvoker::new().transcode(&task, &params, &cancel, &tx))
    };

    // Wait for the tool to report progress before cancelling
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    while seen.is_empty() && Instant::now() < deadline {
        seen.extend(rx.drain().log_lines);
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!seen.is_empty(), "tool never reported progress");

    cancel.cancel();
    let status = worker.join().unwrap();

    assert_eq!(status, TerminalStatus::Stopped);
    assert!(!task.output_path.exists());
}

#[test]
fn cancel_before_first_line_never_completes() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", COPYING_TOOL);
    fs::write(fx.source.join("clip.mov"), b"bytes").unwrap();
    fs::create_dir_all(&fx.dest).unwrap();
    let task = FileTask::new(fx.source.join("clip.mov"), fx.dest.join("clip.mov"));

    let cancel = CancelToken::new();
    cancel.cancel();
    let (tx, _rx) = event_channel();
    let status = ToolInvoker::new().transcode(&task, &params(&tool), &cancel, &tx);

    assert_eq!(status, TerminalStatus::Stopped);
    assert!(!task.output_path.exists());
}

#[test]
fn silent_tool_does_not_stall_cancellation() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", SILENT_TOOL);
    fs::create_dir_all(&fx.dest).unwrap();
    let task = FileTask::new(fx.source.join("quiet.mp4"), fx.dest.join("quiet.mp4"));
    let params = params(&tool);

    let cancel = CancelToken::new();
    let (tx, _rx) = event_channel();
    let worker = {
        let cancel = cancel.clone();
        let task = task.clone();
        thread::spawn(move || {
            ToolInvoker::with_line_wait(Duration::from_millis(20))
                .transcode(&task, &params, &cancel, &tx)
        })
    };

    thread::sleep(Duration::from_millis(300));
    let cancelled_at = Instant::now();
    cancel.cancel();
    let status = worker.join().unwrap();

    assert_eq!(status, TerminalStatus::Stopped);
    assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    assert!(!task.output_path.exists());
}

#[cfg(target_os = "linux")]
#[test]
fn tool_runs_outside_the_callers_process_group() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", GROUP_REPORTING_TOOL);
    fs::write(fx.source.join("clip.mov"), b"movie").unwrap();
    fs::create_dir_all(&fx.dest).unwrap();
    let task = FileTask::new(fx.source.join("clip.mov"), fx.dest.join("clip.mov"));

    let (tx, mut rx) = event_channel();
    let status = ToolInvoker::new().transcode(&task, &params(&tool), &CancelToken::new(), &tx);
    assert_eq!(status, TerminalStatus::Completed(task.output_path.clone()));

    let lines = rx.drain().log_lines;
    let report = lines
        .iter()
        .find(|l| l.starts_with("pid="))
        .expect("tool reported its process group");
    let fields: Vec<&str> = report
        .split_whitespace()
        .map(|f| f.split('=').nth(1).unwrap())
        .collect();
    let (child_pid, child_pgrp) = (fields[0], fields[1]);

    // A terminal Ctrl-C signals our group; the tool leads a group of its own
    assert_eq!(child_pid, child_pgrp);
    assert_ne!(child_pgrp, own_process_group());
}

#[cfg(target_os = "linux")]
fn own_process_group() -> String {
    let stat = fs::read_to_string("/proc/self/stat").unwrap();
    // Fields after the parenthesised command name: state, ppid, pgrp
    let after_comm = &stat[stat.rfind(')').unwrap() + 1..];
    after_comm.split_whitespace().nth(2).unwrap().to_string()
}

#[test]
fn controller_and_poller_drive_a_full_run() {
    let _guard = serial();
    let fx = fixture();
    let tool = write_tool(&fx.tools, "ffmpeg", COPYING_TOOL);
    fs::write(fx.source.join("clip.mov"), b"movie").unwrap();

    let settings = Settings {
        source_folder: fx.source.to_string_lossy().into_owned(),
        destination_folder: fx.dest.to_string_lossy().into_owned(),
        tool_path: tool.to_string_lossy().into_owned(),
        ..Settings::default()
    };

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let board = Arc::new(Mutex::new(StatusBoard::new()));

    let summary = runtime.block_on(async {
        let (tx, rx) = event_channel();
        let board_in_poller = board.clone();
        let poller = spawn_poller(rx, Duration::from_millis(10), move |progress| {
            board_in_poller.lock().unwrap().apply(&progress);
        });

        let mut compressor = Compressor::with_transcoder(
            ToolInvoker::with_line_wait(Duration::from_millis(10)),
            tx,
        );
        compressor.start(&settings).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while compressor.is_running() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let summary = compressor.wait().unwrap().unwrap();
        poller.stop().await.unwrap();
        summary
    });

    assert_eq!(summary.completed, 1);
    let board = board.lock().unwrap();
    assert_eq!(board.current_status, "Completed: clip.mov");
    assert!(board.log.iter().any(|l| l.starts_with("Input #0")));
    assert!(fx.dest.join("clip.mov").exists());
}
