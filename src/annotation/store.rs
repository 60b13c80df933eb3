//! Per-frame record files on disk.
//!
//! One line-oriented text file per frame, named after the source image stem.
//! Saves are atomic (write to a temp file in the same directory, then
//! rename) so an interrupted process never leaves a half-written frame.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

use crate::annotation::record::{AnnotationRecord, FrameRecords, MalformedRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("frame {frame} out of range (sequence has {count} frames)")]
    FrameOutOfRange { frame: usize, count: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads and writes the record set of each frame in a label directory.
///
/// The ordered list of frame stems comes from the external frame store; the
/// record file for frame `i` is `<root>/<stems[i]>.txt`. An absent file is
/// an empty record set.
#[derive(Debug, Clone)]
pub struct LabelStore {
    root: PathBuf,
    stems: Vec<String>,
}

impl LabelStore {
    pub fn new(root: impl Into<PathBuf>, stems: Vec<String>) -> Self {
        Self {
            root: root.into(),
            stems,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frame_count(&self) -> usize {
        self.stems.len()
    }

    pub fn path_for(&self, frame: usize) -> Result<PathBuf, StoreError> {
        let stem = self
            .stems
            .get(frame)
            .ok_or(StoreError::FrameOutOfRange {
                frame,
                count: self.stems.len(),
            })?;
        Ok(self.root.join(format!("{stem}.txt")))
    }

    /// Whether a record file exists for `frame`. Distinguishes "never
    /// annotated" from "annotated with zero boxes" for the matcher's
    /// missing-previous-frame advisory.
    pub fn is_annotated(&self, frame: usize) -> Result<bool, StoreError> {
        Ok(self.path_for(frame)?.exists())
    }

    /// Load the record set of one frame.
    ///
    /// Malformed lines are skipped and reported in the returned warning
    /// list; one bad line never fails the whole frame. A duplicate track id
    /// within the file keeps the first occurrence and reports the rest.
    pub fn load(&self, frame: usize) -> Result<(FrameRecords, Vec<MalformedRecord>), StoreError> {
        let path = self.path_for(frame)?;

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((FrameRecords::new(), Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = FrameRecords::new();
        let mut warnings = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            match AnnotationRecord::parse_line(line) {
                Ok(record) if records.contains(record.track_id) => {
                    warnings.push(MalformedRecord {
                        line_no,
                        reason: format!("duplicate track id {}", record.track_id),
                    });
                }
                Ok(record) => {
                    records.insert(record);
                }
                Err(reason) => {
                    warnings.push(MalformedRecord { line_no, reason });
                }
            }
        }

        for w in &warnings {
            warn!(path = %path.display(), line = w.line_no, "skipped record: {}", w.reason);
        }

        Ok((records, warnings))
    }

    /// Atomically replace the record set of one frame.
    ///
    /// The new contents go to a temp file in the label directory first and
    /// are renamed over the target, so a reader either sees the old complete
    /// file or the new one.
    pub fn save(&self, frame: usize, records: &FrameRecords) -> Result<(), StoreError> {
        let path = self.path_for(frame)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        for record in records.iter() {
            writeln!(tmp, "{}", record.to_line())?;
        }
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        Ok(())
    }

    /// Iterate every frame's records, in frame order. Used for registry
    /// seeding and the ghost-invariant audit.
    pub fn scan(
        &self,
    ) -> impl Iterator<Item = Result<(usize, FrameRecords), StoreError>> + '_ {
        (0..self.stems.len()).map(|frame| self.load(frame).map(|(records, _)| (frame, records)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::bbox::BBox;

    fn store_with_frames(n: usize) -> (tempfile::TempDir, LabelStore) {
        let dir = tempfile::tempdir().unwrap();
        let stems = (0..n).map(|i| format!("frame_{i:04}")).collect();
        let store = LabelStore::new(dir.path(), stems);
        (dir, store)
    }

    #[test]
    fn test_absent_file_is_empty() {
        let (_dir, store) = store_with_frames(3);
        let (records, warnings) = store.load(1).unwrap();
        assert!(records.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (_dir, store) = store_with_frames(2);
        let records: FrameRecords = [
            AnnotationRecord::new(0, 3, BBox::new(0.25, 0.25, 0.125, 0.125)),
            AnnotationRecord::new(1, 8, BBox::new(0.75, 0.5, 0.25, 0.5)),
        ]
        .into_iter()
        .collect();

        store.save(0, &records).unwrap();
        let (loaded, warnings) = store.load(0).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_malformed_line_recovered() {
        let (dir, store) = store_with_frames(1);
        std::fs::write(
            dir.path().join("frame_0000.txt"),
            "0 1 0.5 0.5 0.1 0.1\nnot a record\n2 4 0.2 0.2 0.1 0.1\n",
        )
        .unwrap();

        let (records, warnings) = store.load(0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line_no, 2);
    }

    #[test]
    fn test_duplicate_track_keeps_first() {
        let (dir, store) = store_with_frames(1);
        std::fs::write(
            dir.path().join("frame_0000.txt"),
            "0 1 0.5 0.5 0.1 0.1\n3 1 0.2 0.2 0.1 0.1\n",
        )
        .unwrap();

        let (records, warnings) = store.load(0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.get(1).unwrap().class_id, 0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let (_dir, store) = store_with_frames(1);
        let first: FrameRecords =
            [AnnotationRecord::new(0, 1, BBox::new(0.5, 0.5, 0.1, 0.1))]
                .into_iter()
                .collect();
        let second: FrameRecords =
            [AnnotationRecord::new(2, 9, BBox::new(0.25, 0.25, 0.2, 0.2))]
                .into_iter()
                .collect();

        store.save(0, &first).unwrap();
        store.save(0, &second).unwrap();

        let (loaded, _) = store.load(0).unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_out_of_range_frame() {
        let (_dir, store) = store_with_frames(2);
        assert!(matches!(
            store.load(5),
            Err(StoreError::FrameOutOfRange { frame: 5, count: 2 })
        ));
    }
}
