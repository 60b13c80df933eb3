//! The annotation-consistency algorithms: detector-to-track reconciliation
//! and keyframe interpolation.

mod interpolate;
mod matcher;

pub use interpolate::{InterpolateAllReport, InterpolateError, interpolate, interpolate_all};
pub use matcher::{MatchOutcome, MatcherConfig, RawCandidate, reconcile};
