//! Integration module for connecting detection backends with the
//! annotation engine.
//!
//! This module provides the detector boundary trait, its configuration
//! file, and a pipeline that wires detection, matching and persistence
//! together for the GUI layer to drive.

mod config;
mod detector;
mod pipeline;

pub use config::{ConfigError, DetectorConfig};
pub use detector::DetectorSource;
pub use pipeline::{AnnotatePipeline, PipelineError};

pub use crate::engine::RawCandidate;
