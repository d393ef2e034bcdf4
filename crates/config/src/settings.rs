//! User settings structures and loading logic

use crate::codec::Codec;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Highest accepted quality value (CRF scale, lower = better)
pub const MAX_QUALITY: u8 = 51;

/// Default settings file name, resolved against the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Error type for settings operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading or writing the settings file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// TOML serialization error
    Serialize(toml::ser::Error),
    /// Settings are not usable for a batch run
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to access settings file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse settings: {}", e),
            ConfigError::Serialize(e) => write!(f, "Failed to serialize settings: {}", e),
            ConfigError::Validation(msg) => write!(f, "Invalid settings: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

fn default_quality() -> u8 {
    28
}

fn default_tool_path() -> String {
    "ffmpeg".to_string()
}

/// Folders and encode parameters chosen by the user
///
/// Every field is optional in the file; missing ones take their defaults.
/// The keys `crf` and `ffmpeg_path` are accepted for `quality` and `tool_path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Folder scanned for input videos
    #[serde(default)]
    pub source_folder: String,
    /// Folder receiving the compressed videos
    #[serde(default)]
    pub destination_folder: String,
    /// Quality value, 0-51, lower = higher quality (default 28)
    #[serde(default = "default_quality", alias = "crf")]
    pub quality: u8,
    /// Output codec (default libx265)
    #[serde(default)]
    pub codec: Codec,
    /// Transcoding tool executable (default "ffmpeg")
    #[serde(default = "default_tool_path", alias = "ffmpeg_path")]
    pub tool_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_folder: String::new(),
            destination_folder: String::new(),
            quality: default_quality(),
            codec: Codec::default(),
            tool_path: default_tool_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse settings from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Apply environment variable overrides to the settings
    ///
    /// Overrides the following values if environment variables are set:
    /// - COMPRESSOR_SOURCE_FOLDER -> source_folder
    /// - COMPRESSOR_DESTINATION_FOLDER -> destination_folder
    /// - COMPRESSOR_QUALITY -> quality (ignored unless 0-51)
    /// - COMPRESSOR_CODEC -> codec (ignored unless a known codec)
    /// - COMPRESSOR_TOOL_PATH -> tool_path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("COMPRESSOR_SOURCE_FOLDER") {
            self.source_folder = val;
        }

        if let Ok(val) = env::var("COMPRESSOR_DESTINATION_FOLDER") {
            self.destination_folder = val;
        }

        if let Ok(val) = env::var("COMPRESSOR_QUALITY") {
            if let Ok(quality) = val.trim().parse::<u8>() {
                if quality <= MAX_QUALITY {
                    self.quality = quality;
                }
            }
        }

        if let Ok(val) = env::var("COMPRESSOR_CODEC") {
            if let Ok(codec) = val.parse::<Codec>() {
                self.codec = codec;
            }
        }

        if let Ok(val) = env::var("COMPRESSOR_TOOL_PATH") {
            if !val.trim().is_empty() {
                self.tool_path = val;
            }
        }
    }

    /// Load settings from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from_file(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Write the settings as pretty TOML, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check that the settings are usable for a batch run
    ///
    /// Both folders must be chosen before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_folder.trim().is_empty() || self.destination_folder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Please select both source and destination folders.".to_string(),
            ));
        }
        if self.quality > MAX_QUALITY {
            return Err(ConfigError::Validation(format!(
                "quality must be between 0 and {}, got {}",
                MAX_QUALITY, self.quality
            )));
        }
        if self.tool_path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tool path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
