//! CLI entry point for Video Compressor
//!
//! Loads settings, applies command line overrides, runs one batch and reports
//! progress on the terminal until the batch finishes or the user stops it.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use video_compressor::config::DEFAULT_SETTINGS_FILE;
use video_compressor::{
    check_tool_available, eligible_files, event_channel, resolve_unique_path, spawn_poller,
    BatchJob, BatchSummary, Codec, Compressor, Progress, Settings, StatusBoard,
    DEFAULT_POLL_INTERVAL,
};

const STOP_PROMPT: &str =
    "If you stop, the current video conversion will be incomplete. Do you want to proceed? [y/N] ";

/// How often the main loop checks whether the worker is done
const RUN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Video Compressor - batch-convert a folder of videos with ffmpeg
#[derive(Parser, Debug)]
#[command(name = "video-compressor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings file
    #[arg(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Folder containing the videos to convert
    #[arg(short, long)]
    source: Option<String>,

    /// Folder receiving the converted videos
    #[arg(short, long)]
    destination: Option<String>,

    /// Quality value, 0-51 (lower is better quality, larger files)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Output codec: libx264, libx265, vp9 or av1
    #[arg(long)]
    codec: Option<Codec>,

    /// Transcoding tool executable
    #[arg(long)]
    tool: Option<String>,

    /// Write the effective settings back to the settings file, then run
    #[arg(long, default_value = "false")]
    save: bool,

    /// Write the effective settings and exit without converting
    #[arg(long, default_value = "false")]
    save_only: bool,

    /// List the planned conversions without running the tool
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Skip the tool availability check. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Interval between progress updates, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,

    /// Stop on Ctrl-C without asking for confirmation
    #[arg(short, long, default_value = "false")]
    yes: bool,

    /// Print the tool's output lines
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Args {
    /// Command line values take precedence over the file and environment
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(source) = &self.source {
            settings.source_folder = source.clone();
        }
        if let Some(destination) = &self.destination {
            settings.destination_folder = destination.clone();
        }
        if let Some(quality) = self.quality {
            settings.quality = quality;
        }
        if let Some(codec) = self.codec {
            settings.codec = codec;
        }
        if let Some(tool) = &self.tool {
            settings.tool_path = tool.clone();
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let mut settings = match Settings::load_or_default(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    args.apply_to(&mut settings);

    if args.save || args.save_only {
        if let Err(e) = settings.save(&args.config) {
            eprintln!("Failed to save {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Settings saved to {}", args.config.display());
        if args.save_only {
            return ExitCode::SUCCESS;
        }
    }

    if args.dry_run {
        return dry_run(&settings);
    }

    if args.skip_checks {
        println!("WARNING: Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = check_tool_available(Path::new(&settings.tool_path)) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let (events, receiver) = event_channel();
    let verbose = args.verbose;
    let mut board = StatusBoard::new();
    let poller = spawn_poller(
        receiver,
        Duration::from_millis(args.poll_interval_ms.max(1)),
        move |progress| report(&mut board, &progress, verbose),
    );

    let mut compressor = Compressor::new(events);
    let run_id = match compressor.start(&settings) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{}", e);
            let _ = poller.stop().await;
            return ExitCode::FAILURE;
        }
    };
    println!(
        "Converting {} -> {} ({}, quality {})",
        settings.source_folder, settings.destination_folder, settings.codec, settings.quality
    );

    let mut stop_requested = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if stop_requested {
                    continue;
                }
                let decision = if args.yes {
                    StopDecision::Confirmed
                } else {
                    await_stop_decision(prompt_stop(), &compressor).await
                };
                match decision {
                    StopDecision::Confirmed => {
                        stop_requested = compressor.request_stop();
                        if !stop_requested {
                            println!("Nothing left to stop");
                        }
                    }
                    StopDecision::Declined => println!("Continuing"),
                    StopDecision::RunFinished => {
                        println!();
                        println!("The batch finished before an answer was given");
                    }
                }
            }
            _ = tokio::time::sleep(RUN_CHECK_INTERVAL) => {
                if !compressor.is_running() {
                    break;
                }
            }
        }
    }

    let result = compressor.wait();
    if let Err(e) = poller.stop().await {
        warn!("Progress poller ended abnormally: {}", e);
    }

    match result {
        Ok(Some(summary)) => {
            print_summary(&summary);
            info!("Batch {} done", run_id);
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Batch error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Print what a run would do without touching anything
fn dry_run(settings: &Settings) -> ExitCode {
    let job = match BatchJob::from_settings(settings) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = match eligible_files(&job.source_dir) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Cannot read {}: {}", job.source_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if inputs.is_empty() {
        println!("No video files found in {}", job.source_dir.display());
    }
    for input in &inputs {
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = resolve_unique_path(&job.dest_dir.join(name));
        println!("{} -> {}", input.display(), output.display());
    }
    ExitCode::SUCCESS
}

fn report(board: &mut StatusBoard, progress: &Progress, verbose: bool) {
    board.apply(progress);
    if verbose {
        for line in &progress.log_lines {
            println!("  {}", line);
        }
    }
    // Lines already reached the terminal (or were not wanted)
    board.clear_log();
    if progress.latest_status.is_some() {
        println!("{}", board.current_status);
    }
}

/// Outcome of a stop prompt
#[derive(Debug, PartialEq, Eq)]
enum StopDecision {
    Confirmed,
    Declined,
    /// Nothing is running any more, the answer no longer matters
    RunFinished,
}

/// Print the stop prompt and read the answer on a dedicated thread.
///
/// A plain thread is used so an unanswered prompt does not hold the runtime
/// open at exit. A failed read counts as "no".
fn prompt_stop() -> oneshot::Receiver<bool> {
    let (tx, rx) = oneshot::channel();

    print!("{}", STOP_PROMPT);
    let _ = io::stdout().flush();

    let spawned = thread::Builder::new()
        .name("stop-prompt".to_string())
        .spawn(move || {
            let mut answer = String::new();
            let confirmed = match io::stdin().lock().read_line(&mut answer) {
                Ok(_) => is_yes(&answer),
                Err(_) => false,
            };
            let _ = tx.send(confirmed);
        });
    if let Err(e) = spawned {
        warn!("Cannot read the answer: {}", e);
    }

    rx
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Wait for the user's answer, or for the run to end while they think
async fn await_stop_decision(
    answer: oneshot::Receiver<bool>,
    compressor: &Compressor,
) -> StopDecision {
    tokio::select! {
        biased;
        answer = answer => {
            if answer.unwrap_or(false) {
                StopDecision::Confirmed
            } else {
                StopDecision::Declined
            }
        }
        _ = run_finished(compressor) => StopDecision::RunFinished,
    }
}

async fn run_finished(compressor: &Compressor) {
    while compressor.is_running() {
        tokio::time::sleep(RUN_CHECK_INTERVAL).await;
    }
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "Done: {} of {} file(s) converted, {} failed{}",
        summary.completed,
        summary.scheduled,
        summary.failed,
        if summary.cancelled { " (stopped)" } else { "" }
    );
}
