//! Detector configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read detector config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse detector config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Fatal at startup: nothing runs without resolvable weights.
    #[error("detector weights not found at {0}")]
    ModelNotFound(PathBuf),
}

/// Defines what the detector config file should contain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Filesystem path to the detector's weights.
    pub model_path: PathBuf,
    /// Minimum confidence for a raw detection to be considered.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// IoU above which a candidate duplicates a manual box.
    #[serde(default = "default_dup_iou_threshold")]
    pub dup_iou_threshold: f32,
    /// Minimum IoU for a candidate to continue an existing track.
    #[serde(default = "default_match_iou_threshold")]
    pub match_iou_threshold: f32,
}

fn default_confidence_threshold() -> f32 {
    0.25
}

fn default_dup_iou_threshold() -> f32 {
    0.5
}

fn default_match_iou_threshold() -> f32 {
    0.3
}

impl DetectorConfig {
    /// Load and validate the config. A `model_path` that does not resolve
    /// on disk is fatal: the process must halt before any frame
    /// processing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !self.model_path.exists() {
            return Err(ConfigError::ModelNotFound(self.model_path));
        }
        Ok(self)
    }

    pub fn matcher_config(&self) -> crate::engine::MatcherConfig {
        crate::engine::MatcherConfig {
            dup_thresh: self.dup_iou_threshold,
            match_thresh: self.match_iou_threshold,
        }
    }
}
