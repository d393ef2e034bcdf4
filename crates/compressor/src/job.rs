//! Batch job and per-file task definitions.

use crate::cancel::CancelToken;
use crate::config::{ConfigError, Settings};
use crate::encode::EncodeParameters;
use std::path::PathBuf;
use uuid::Uuid;

/// One end-to-end pass over a source folder.
///
/// Owns the cancel token for its lifetime; the token is created fresh with
/// the job and never reset.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Unique run identifier, used to tag log records
    pub id: Uuid,
    /// Folder scanned for input videos
    pub source_dir: PathBuf,
    /// Folder receiving the compressed videos
    pub dest_dir: PathBuf,
    /// Parameters applied to every file
    pub params: EncodeParameters,
    cancel: CancelToken,
}

impl BatchJob {
    /// Create a new batch job with its own cancel token
    pub fn new(
        source_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        params: EncodeParameters,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            params,
            cancel: CancelToken::new(),
        }
    }

    /// Build a job from saved settings
    ///
    /// # Errors
    /// Returns `ConfigError::Validation` when a folder is missing or the
    /// encode parameters are out of range. No job is created in that case.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let params = EncodeParameters::from_settings(settings)?;
        Ok(Self::new(
            settings.source_folder.trim(),
            settings.destination_folder.trim(),
            params,
        ))
    }

    /// Token observed by the worker; cancel it to stop the run
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// One eligible input file and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub input_path: PathBuf,
    /// Already made unique within the destination folder
    pub output_path: PathBuf,
}

impl FileTask {
    pub fn new(input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
        }
    }
}
