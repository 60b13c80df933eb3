//! Data model and persistence for per-frame bounding-box annotations.

mod bbox;
mod class_table;
mod record;
mod registry;
mod store;

pub use bbox::{BBox, iou_batch};
pub use class_table::ClassTable;
pub use record::{AnnotationRecord, FrameRecords, MalformedRecord};
pub use registry::{AuditError, GhostInvariantViolation, TrackRegistry};
pub use store::{LabelStore, StoreError};
