//! Annotation-consistency engine for frame-by-frame video labeling.
//!
//! The crate keeps a directory of per-frame bounding-box record files
//! consistent while a human labels a video: detector output is reconciled
//! against existing track identities, gaps between keyframes are filled by
//! linear interpolation, and a process-wide registry guarantees the set of
//! known track ids always matches what exists on disk.

pub mod annotation;
pub mod engine;
pub mod integration;

pub use annotation::{
    AnnotationRecord, BBox, ClassTable, FrameRecords, LabelStore, TrackRegistry,
};
pub use engine::{
    InterpolateAllReport, InterpolateError, MatchOutcome, MatcherConfig, interpolate,
    interpolate_all, reconcile,
};
pub use integration::{AnnotatePipeline, DetectorConfig, DetectorSource, RawCandidate};
