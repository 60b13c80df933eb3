//! Annotation records and the per-frame record set.

use std::collections::BTreeMap;
use std::collections::btree_map;

use thiserror::Error;

use crate::annotation::bbox::BBox;

/// One labeled box in one frame.
///
/// A record belongs to exactly one frame; the same `track_id` across frames
/// is what constitutes a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotationRecord {
    /// Object class, indexing into the class table
    pub class_id: u32,
    /// Persistent object identity across frames
    pub track_id: u64,
    /// Normalized bounding box
    pub bbox: BBox,
}

impl AnnotationRecord {
    pub fn new(class_id: u32, track_id: u64, bbox: BBox) -> Self {
        Self {
            class_id,
            track_id,
            bbox,
        }
    }

    /// Parse one `class_id track_id cx cy w h` line.
    pub fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(format!("expected 6 fields, got {}", fields.len()));
        }

        let class_id: u32 = fields[0]
            .parse()
            .map_err(|_| format!("bad class id {:?}", fields[0]))?;
        let track_id: u64 = fields[1]
            .parse()
            .map_err(|_| format!("bad track id {:?}", fields[1]))?;

        let mut coords = [0.0f32; 4];
        for (slot, field) in coords.iter_mut().zip(&fields[2..]) {
            *slot = field
                .parse()
                .map_err(|_| format!("bad coordinate {:?}", field))?;
        }

        let bbox = BBox::new(coords[0], coords[1], coords[2], coords[3]);
        if !bbox.is_normalized() {
            return Err(format!("coordinates out of [0,1]: {:?}", &fields[2..]));
        }

        Ok(Self {
            class_id,
            track_id,
            bbox,
        })
    }

    /// Serialize to the on-disk line format (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.track_id, self.bbox.cx, self.bbox.cy, self.bbox.w, self.bbox.h
        )
    }
}

/// A line in a record file that could not be parsed.
///
/// Recovered locally: the line is skipped, the rest of the frame loads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line_no}: {reason}")]
pub struct MalformedRecord {
    pub line_no: usize,
    pub reason: String,
}

/// The record set of one frame, keyed by track id.
///
/// Keying by `track_id` enforces the frame-level uniqueness invariant (a
/// track appears at most once per frame) and gives every consumer a stable
/// ascending-id iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameRecords(BTreeMap<u64, AnnotationRecord>);

impl FrameRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any existing record for the same track.
    /// Returns the replaced record, if any.
    pub fn insert(&mut self, record: AnnotationRecord) -> Option<AnnotationRecord> {
        self.0.insert(record.track_id, record)
    }

    pub fn remove(&mut self, track_id: u64) -> Option<AnnotationRecord> {
        self.0.remove(&track_id)
    }

    pub fn get(&self, track_id: u64) -> Option<&AnnotationRecord> {
        self.0.get(&track_id)
    }

    pub fn contains(&self, track_id: u64) -> bool {
        self.0.contains_key(&track_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records in ascending track-id order.
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.0.values()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.keys().copied()
    }

    pub fn boxes(&self) -> Vec<BBox> {
        self.0.values().map(|r| r.bbox).collect()
    }
}

impl FromIterator<AnnotationRecord> for FrameRecords {
    fn from_iter<I: IntoIterator<Item = AnnotationRecord>>(iter: I) -> Self {
        let mut records = Self::new();
        for r in iter {
            records.insert(r);
        }
        records
    }
}

impl IntoIterator for FrameRecords {
    type Item = AnnotationRecord;
    type IntoIter = btree_map::IntoValues<u64, AnnotationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}
