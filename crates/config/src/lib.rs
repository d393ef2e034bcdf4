//! Settings module for the video compressor
//!
//! Handles loading user settings from TOML files and environment variable overrides.

pub mod codec;
pub mod settings;

pub use codec::{Codec, ParseCodecError};
pub use settings::*;
