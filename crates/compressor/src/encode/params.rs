//! Encode parameters shared by every file of a batch run

use crate::config::{Codec, ConfigError, Settings, MAX_QUALITY};
use std::path::{Path, PathBuf};

/// Encoding-speed preset passed to the tool for every file
pub const PRESET: &str = "slow";

/// Parameters for one batch run.
///
/// Immutable once built; the quality range is checked on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeParameters {
    codec: Codec,
    quality: u8,
    tool_path: PathBuf,
}

impl EncodeParameters {
    /// Create new encode parameters
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` if `quality` is above 51 or the tool
    /// path is empty.
    pub fn new(
        codec: Codec,
        quality: u8,
        tool_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let tool_path = tool_path.into();
        if quality > MAX_QUALITY {
            return Err(ConfigError::Validation(format!(
                "quality must be between 0 and {}, got {}",
                MAX_QUALITY, quality
            )));
        }
        if tool_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "tool path must not be empty".to_string(),
            ));
        }
        Ok(Self {
            codec,
            quality,
            tool_path,
        })
    }

    /// Take codec, quality and tool from saved settings
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Self::new(settings.codec, settings.quality, settings.tool_path.trim())
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn preset(&self) -> &'static str {
        PRESET
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }
}
