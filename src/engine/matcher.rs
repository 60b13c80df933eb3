//! Greedy reconciliation of raw detector output against existing tracks.

use tracing::{debug, warn};

use crate::annotation::{AnnotationRecord, BBox, FrameRecords, TrackRegistry, iou_batch};

/// One raw detector output box. No track identity yet; lives only for the
/// duration of a single matching pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
    pub bbox: BBox,
    /// Class predicted by the detector (may be overridden by sticky class)
    pub class_id: u32,
    pub confidence: f32,
}

impl RawCandidate {
    pub fn new(bbox: BBox, class_id: u32, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Thresholds for the matching pass.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// A candidate overlapping a manual box above this IoU is a redundant
    /// detector guess and is dropped.
    pub dup_thresh: f32,
    /// Minimum IoU for a candidate to continue a previous-frame track.
    pub match_thresh: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            dup_thresh: 0.5,
            match_thresh: 0.3,
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Final record set for the current frame
    pub records: FrameRecords,
    /// False when no previous-frame records were available and matching was
    /// skipped entirely (non-fatal advisory; all candidates became new
    /// tracks).
    pub smart_matching: bool,
    /// Track ids freshly allocated in this pass, in detector output order
    pub new_track_ids: Vec<u64>,
    /// Candidates dropped as duplicates of manual boxes
    pub suppressed: usize,
}

/// Reconcile raw detector candidates against the previous frame's tracks
/// and the current frame's manual boxes.
///
/// The pass is deterministic: previous-frame tracks are visited in
/// ascending id order, and IoU ties break by smaller centroid distance,
/// then higher confidence. Human-placed boxes always survive untouched; a
/// previous-frame track with no matching candidate simply produces nothing
/// (the engine never fabricates a box for a vanished object).
///
/// `registry` supplies fresh ids for unmatched candidates and the
/// sticky-class memory: a candidate assigned to an existing track keeps
/// that track's last confirmed class rather than the detector's prediction,
/// which suppresses frame-to-frame label flicker.
pub fn reconcile(
    previous: Option<&FrameRecords>,
    manual: &FrameRecords,
    candidates: Vec<RawCandidate>,
    registry: &mut TrackRegistry,
    config: &MatcherConfig,
) -> MatchOutcome {
    // Step 1: drop candidates that duplicate a human-placed box.
    let manual_boxes = manual.boxes();
    let before = candidates.len();
    let candidates: Vec<RawCandidate> = candidates
        .into_iter()
        .filter(|c| manual_boxes.iter().all(|m| m.iou(&c.bbox) <= config.dup_thresh))
        .collect();
    let suppressed = before - candidates.len();

    let mut records = manual.clone();
    let mut assigned = vec![false; candidates.len()];
    let smart_matching = previous.is_some();

    // Step 2: greedy assignment, ascending previous track id.
    if let Some(previous) = previous {
        let prev_records: Vec<&AnnotationRecord> = previous.iter().collect();
        let prev_boxes: Vec<BBox> = prev_records.iter().map(|r| r.bbox).collect();
        let cand_boxes: Vec<BBox> = candidates.iter().map(|c| c.bbox).collect();
        let ious = iou_batch(&prev_boxes, &cand_boxes);

        for (i, &prev_record) in prev_records.iter().enumerate() {
            // A manual box already pins this track in the current frame.
            if records.contains(prev_record.track_id) {
                continue;
            }

            let mut best: Option<(usize, f32)> = None;
            for (j, candidate) in candidates.iter().enumerate() {
                let iou = ious[[i, j]];
                if assigned[j] || iou <= config.match_thresh {
                    continue;
                }
                best = match best {
                    None => Some((j, iou)),
                    Some((k, best_iou)) => {
                        if challenger_wins(prev_record, (&candidates[k], best_iou), (candidate, iou))
                        {
                            Some((j, iou))
                        } else {
                            Some((k, best_iou))
                        }
                    }
                };
            }

            if let Some((j, iou)) = best {
                assigned[j] = true;
                let candidate = &candidates[j];
                // Sticky class: trust the human-confirmed label over the
                // detector's prediction for a known track.
                let class_id = registry
                    .confirmed_class(prev_record.track_id)
                    .unwrap_or(candidate.class_id);
                debug!(
                    track_id = prev_record.track_id,
                    iou, class_id, "matched candidate to existing track"
                );
                records.insert(AnnotationRecord::new(
                    class_id,
                    prev_record.track_id,
                    candidate.bbox,
                ));
            }
            // Unmatched previous track: occluded or gone, no record.
        }
    } else {
        warn!("previous frame unannotated, smart matching skipped; all candidates become new tracks");
    }

    // Step 3: leftovers become new tracks with fresh ids.
    let mut new_track_ids = Vec::new();
    for (j, candidate) in candidates.iter().enumerate() {
        if assigned[j] {
            continue;
        }
        let track_id = registry.next_fresh_id();
        records.insert(AnnotationRecord::new(
            candidate.class_id,
            track_id,
            candidate.bbox,
        ));
        new_track_ids.push(track_id);
    }

    MatchOutcome {
        records,
        smart_matching,
        new_track_ids,
        suppressed,
    }
}

/// Tie-break between the incumbent best candidate and a challenger for the
/// same track: higher IoU wins, then smaller centroid distance, then higher
/// confidence. Returns true when the challenger takes over.
fn challenger_wins(
    track: &AnnotationRecord,
    incumbent: (&RawCandidate, f32),
    challenger: (&RawCandidate, f32),
) -> bool {
    let (inc, inc_iou) = incumbent;
    let (chal, chal_iou) = challenger;

    if chal_iou != inc_iou {
        return chal_iou > inc_iou;
    }

    let inc_dist = track.bbox.center_distance(&inc.bbox);
    let chal_dist = track.bbox.center_distance(&chal.bbox);
    if chal_dist != inc_dist {
        return chal_dist < inc_dist;
    }

    chal.confidence > inc.confidence
}
