//! Linear interpolation of a track between two keyframes.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{info, warn};

use crate::annotation::{AnnotationRecord, LabelStore, StoreError, TrackRegistry};

#[derive(Debug, Error)]
pub enum InterpolateError {
    #[error("invalid frame range: start {start} must be before end {end}")]
    InvalidRange { start: usize, end: usize },
    #[error("track {track_id} has no keyframe at frame {frame}")]
    MissingKeyframe { track_id: u64, frame: usize },
    #[error(
        "class mismatch for track {track_id}: class {start_class} at frame {start} vs class {end_class} at frame {end}"
    )]
    ClassMismatch {
        track_id: u64,
        start: usize,
        start_class: u32,
        end: usize,
        end_class: u32,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fill every frame strictly between two keyframes of one track with a
/// linearly interpolated box.
///
/// Both endpoints must hold a record for `track_id` with the same class;
/// preconditions are checked before anything is written, so a failed call
/// leaves the store untouched. In each interior frame the synthesized
/// record replaces an existing record of the same track and leaves every
/// other track alone. The output is a pure function of the two keyframe
/// boxes and the frame distance, so re-running is idempotent.
///
/// Returns the number of frames written. An adjacent pair (`end ==
/// start + 1`) is a no-op success.
pub fn interpolate(
    store: &LabelStore,
    registry: &mut TrackRegistry,
    track_id: u64,
    start: usize,
    end: usize,
) -> Result<usize, InterpolateError> {
    if start >= end {
        return Err(InterpolateError::InvalidRange { start, end });
    }

    let (start_records, _) = store.load(start)?;
    let (end_records, _) = store.load(end)?;

    let start_key = start_records
        .get(track_id)
        .ok_or(InterpolateError::MissingKeyframe {
            track_id,
            frame: start,
        })?;
    let end_key = end_records
        .get(track_id)
        .ok_or(InterpolateError::MissingKeyframe {
            track_id,
            frame: end,
        })?;

    if start_key.class_id != end_key.class_id {
        return Err(InterpolateError::ClassMismatch {
            track_id,
            start,
            start_class: start_key.class_id,
            end,
            end_class: end_key.class_id,
        });
    }

    let span = (end - start) as f32;
    let mut written = 0;

    for frame in start + 1..end {
        let r = (frame - start) as f32 / span;
        let bbox = start_key.bbox.lerp(&end_key.bbox, r);

        let (mut records, _) = store.load(frame)?;
        let replaced = records.insert(AnnotationRecord::new(start_key.class_id, track_id, bbox));
        store.save(frame, &records)?;

        // Only a genuinely new record changes the track's presence count.
        if replaced.is_none() {
            registry.register(track_id);
        }
        written += 1;
    }

    info!(track_id, start, end, written, "interpolated track segment");
    Ok(written)
}

/// Outcome of an interpolate-all sweep.
#[derive(Debug, Default)]
pub struct InterpolateAllReport {
    /// Total interior frames written across all segments
    pub frames_written: usize,
    /// Segments attempted (keyframe pairs with a gap to fill)
    pub segments: usize,
    /// Segments skipped because a precondition failed, with the reason
    pub skipped: Vec<(u64, InterpolateError)>,
}

/// Interpolate every track that has at least two keyframes.
///
/// Keyframes are collected from the store as it stands before any writing,
/// then each consecutive pair is interpolated independently: keyframes at
/// frames 10, 50, 90 give two separate runs (10→50 and 50→90), and a pair
/// that fails its preconditions is skipped and reported without affecting
/// the others. I/O errors abort the sweep.
pub fn interpolate_all(
    store: &LabelStore,
    registry: &mut TrackRegistry,
) -> Result<InterpolateAllReport, StoreError> {
    // track id -> keyframe frames, ascending.
    let mut keyframes: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for frame in store.scan() {
        let (frame_idx, records) = frame?;
        for record in records.iter() {
            keyframes.entry(record.track_id).or_default().push(frame_idx);
        }
    }

    let mut report = InterpolateAllReport::default();

    for (track_id, frames) in keyframes {
        for pair in frames.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            if end - start <= 1 {
                continue;
            }
            report.segments += 1;
            match interpolate(store, registry, track_id, start, end) {
                Ok(written) => report.frames_written += written,
                Err(InterpolateError::Store(e)) => return Err(e),
                Err(e) => {
                    warn!(track_id, start, end, "skipped segment: {e}");
                    report.skipped.push((track_id, e));
                }
            }
        }
    }

    info!(
        segments = report.segments,
        frames = report.frames_written,
        skipped = report.skipped.len(),
        "interpolate-all sweep finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{BBox, FrameRecords};

    fn store_with_frames(n: usize) -> (tempfile::TempDir, LabelStore) {
        let dir = tempfile::tempdir().unwrap();
        let stems = (0..n).map(|i| format!("{i:06}")).collect();
        let store = LabelStore::new(dir.path(), stems);
        (dir, store)
    }

    fn put(store: &LabelStore, frame: usize, records: &[AnnotationRecord]) {
        let set: FrameRecords = records.iter().copied().collect();
        store.save(frame, &set).unwrap();
    }

    #[test]
    fn test_midpoint_is_exact() {
        let (_dir, store) = store_with_frames(51);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            10,
            &[AnnotationRecord::new(2, 5, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        put(
            &store,
            50,
            &[AnnotationRecord::new(2, 5, BBox::new(0.6, 0.2, 0.1, 0.1))],
        );
        registry.register(5);
        registry.register(5);

        let written = interpolate(&store, &mut registry, 5, 10, 50).unwrap();
        assert_eq!(written, 39);

        let (mid, _) = store.load(30).unwrap();
        let record = mid.get(5).unwrap();
        assert_eq!(record.class_id, 2);
        assert_eq!(record.bbox, BBox::new(0.4, 0.2, 0.1, 0.1));
    }

    #[test]
    fn test_idempotent() {
        let (_dir, store) = store_with_frames(11);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.1, 0.1, 0.05, 0.05))],
        );
        put(
            &store,
            10,
            &[AnnotationRecord::new(1, 3, BBox::new(0.9, 0.9, 0.15, 0.15))],
        );

        interpolate(&store, &mut registry, 3, 0, 10).unwrap();
        let first: Vec<FrameRecords> = (1..10).map(|f| store.load(f).unwrap().0).collect();

        interpolate(&store, &mut registry, 3, 0, 10).unwrap();
        let second: Vec<FrameRecords> = (1..10).map(|f| store.load(f).unwrap().0).collect();

        assert_eq!(first, second);
        // Re-running overwrote rather than re-registered.
        assert!(registry.audit(&store).is_ok());
    }

    #[test]
    fn test_other_tracks_untouched() {
        let (_dir, store) = store_with_frames(5);
        let mut registry = TrackRegistry::new();
        let bystander = AnnotationRecord::new(0, 9, BBox::new(0.8, 0.8, 0.1, 0.1));
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        put(&store, 2, &[bystander]);
        put(
            &store,
            4,
            &[AnnotationRecord::new(1, 3, BBox::new(0.6, 0.2, 0.1, 0.1))],
        );

        interpolate(&store, &mut registry, 3, 0, 4).unwrap();

        let (frame2, _) = store.load(2).unwrap();
        assert_eq!(frame2.get(9), Some(&bystander));
        assert!(frame2.contains(3));
    }

    #[test]
    fn test_missing_keyframe_fails_without_writes() {
        let (_dir, store) = store_with_frames(5);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        // No record for track 3 at frame 4.

        let err = interpolate(&store, &mut registry, 3, 0, 4).unwrap_err();
        assert!(matches!(
            err,
            InterpolateError::MissingKeyframe { track_id: 3, frame: 4 }
        ));
        for frame in 1..4 {
            assert!(store.load(frame).unwrap().0.is_empty());
        }
    }

    #[test]
    fn test_class_mismatch_fails() {
        let (_dir, store) = store_with_frames(5);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        put(
            &store,
            4,
            &[AnnotationRecord::new(2, 3, BBox::new(0.6, 0.2, 0.1, 0.1))],
        );

        let err = interpolate(&store, &mut registry, 3, 0, 4).unwrap_err();
        assert!(matches!(err, InterpolateError::ClassMismatch { .. }));
        assert!(store.load(2).unwrap().0.is_empty());
    }

    #[test]
    fn test_invalid_range() {
        let (_dir, store) = store_with_frames(5);
        let mut registry = TrackRegistry::new();
        assert!(matches!(
            interpolate(&store, &mut registry, 3, 4, 4),
            Err(InterpolateError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_adjacent_keyframes_noop() {
        let (_dir, store) = store_with_frames(3);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        put(
            &store,
            1,
            &[AnnotationRecord::new(1, 3, BBox::new(0.3, 0.2, 0.1, 0.1))],
        );

        assert_eq!(interpolate(&store, &mut registry, 3, 0, 1).unwrap(), 0);
    }

    #[test]
    fn test_interpolate_all_segments_independently() {
        let (_dir, store) = store_with_frames(91);
        let mut registry = TrackRegistry::new();
        // Power-of-two coordinates: the midpoint lerps are exact and
        // survive the on-disk decimal format unchanged.
        let k10 = AnnotationRecord::new(0, 5, BBox::new(0.25, 0.25, 0.125, 0.125));
        let k50 = AnnotationRecord::new(0, 5, BBox::new(0.75, 0.25, 0.125, 0.125));
        let k90 = AnnotationRecord::new(0, 5, BBox::new(0.75, 0.75, 0.125, 0.125));
        put(&store, 10, &[k10]);
        put(&store, 50, &[k50]);
        put(&store, 90, &[k90]);
        for _ in 0..3 {
            registry.register(5);
        }

        let report = interpolate_all(&store, &mut registry).unwrap();
        assert_eq!(report.segments, 2);
        assert_eq!(report.frames_written, 39 + 39);
        assert!(report.skipped.is_empty());

        // Each segment is the pairwise lerp of its own endpoints.
        let (f30, _) = store.load(30).unwrap();
        assert_eq!(f30.get(5).unwrap().bbox, k10.bbox.lerp(&k50.bbox, 0.5));
        let (f70, _) = store.load(70).unwrap();
        assert_eq!(f70.get(5).unwrap().bbox, k50.bbox.lerp(&k90.bbox, 0.5));

        assert!(registry.audit(&store).is_ok());
    }

    #[test]
    fn test_interpolate_all_skips_mismatched_pair() {
        let (_dir, store) = store_with_frames(10);
        let mut registry = TrackRegistry::new();
        put(
            &store,
            0,
            &[AnnotationRecord::new(1, 3, BBox::new(0.2, 0.2, 0.1, 0.1))],
        );
        put(
            &store,
            5,
            &[AnnotationRecord::new(2, 3, BBox::new(0.4, 0.2, 0.1, 0.1))],
        );
        put(
            &store,
            9,
            &[AnnotationRecord::new(2, 3, BBox::new(0.6, 0.2, 0.1, 0.1))],
        );

        let report = interpolate_all(&store, &mut registry).unwrap();

        // Pair (0,5) mismatches classes and is skipped; (5,9) still runs.
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.frames_written, 3);
        assert!(store.load(2).unwrap().0.is_empty());
        assert!(store.load(7).unwrap().0.contains(3));
    }
}
