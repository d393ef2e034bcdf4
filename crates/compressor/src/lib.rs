//! Video Compressor
//!
//! Headless batch runner that converts every video in a source folder into a
//! destination folder through an external transcoding tool, one file at a
//! time, with cooperative cancellation and queued progress reporting.

pub mod batch;
pub mod cancel;
pub mod controller;
pub mod encode;
pub mod events;
pub mod job;
pub mod startup;
pub mod unique_path;

pub use batch::{eligible_files, is_eligible_name, run_batch, BatchSummary, VIDEO_EXTENSIONS};
pub use cancel::CancelToken;
pub use controller::{Compressor, CompressorError};
pub use encode::{
    build_tool_command, EncodeParameters, TerminalStatus, ToolInvoker, Transcoder, PRESET,
};
pub use events::{
    event_channel, spawn_poller, EventReceiver, EventSender, PollerHandle, Progress,
    StatusBoard, StatusEvent, DEFAULT_POLL_INTERVAL,
};
pub use job::{BatchJob, FileTask};
pub use startup::{check_tool_available, StartupError};
pub use unique_path::resolve_unique_path;
pub use video_compressor_config as config;
pub use video_compressor_config::{Codec, Settings};
