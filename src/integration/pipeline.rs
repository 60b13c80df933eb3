//! Pipeline combining detection, matching and persistence.

use thiserror::Error;
use tracing::debug;

use crate::annotation::{AnnotationRecord, LabelStore, StoreError, TrackRegistry};
use crate::engine::{
    InterpolateAllReport, InterpolateError, MatchOutcome, MatcherConfig, interpolate,
    interpolate_all, reconcile,
};

use super::{DetectorConfig, DetectorSource};

#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("detector failed")]
    Detector(#[source] E),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives one label directory: detector, matcher, record store and track
/// registry behind a single user-action-driven interface.
///
/// Every operation runs to completion before the next one starts (the GUI
/// issues them one at a time), so the store and registry have a single
/// writer at any instant. All mutation goes through this type, which is
/// what keeps the registry's live set equal to what is on disk.
pub struct AnnotatePipeline<D: DetectorSource> {
    detector: D,
    store: LabelStore,
    registry: TrackRegistry,
    matcher: MatcherConfig,
    min_confidence: f32,
}

impl<D: DetectorSource> AnnotatePipeline<D> {
    /// Open a label directory: seeds the registry from everything on disk.
    pub fn open(detector: D, store: LabelStore, matcher: MatcherConfig) -> Result<Self, StoreError> {
        let registry = TrackRegistry::seed_from_store(&store)?;
        Ok(Self {
            detector,
            store,
            registry,
            matcher,
            min_confidence: 0.0,
        })
    }

    /// Open a label directory with every threshold taken from a loaded
    /// detector config, so the confidence cutoff and the two IoU
    /// thresholds cannot drift apart across call sites.
    pub fn from_config(
        detector: D,
        store: LabelStore,
        config: &DetectorConfig,
    ) -> Result<Self, StoreError> {
        Ok(Self::open(detector, store, config.matcher_config())?
            .with_min_confidence(config.confidence_threshold))
    }

    /// Discard raw detections below this confidence before matching.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Run detection on the current frame and reconcile the result against
    /// the previous frame's tracks and the boxes already present, then
    /// persist.
    ///
    /// When the previous frame was never annotated (or `frame` is 0) the
    /// outcome carries `smart_matching == false`: every candidate became a
    /// new track, which the caller should surface as an advisory.
    pub fn process_frame(
        &mut self,
        frame: usize,
        image: &[u8],
        width: u32,
        height: u32,
    ) -> Result<MatchOutcome, PipelineError<D::Error>> {
        let previous = if frame > 0 && self.store.is_annotated(frame - 1)? {
            Some(self.store.load(frame - 1)?.0)
        } else {
            None
        };
        let (manual, _) = self.store.load(frame)?;

        let mut candidates = self
            .detector
            .detect(image, width, height)
            .map_err(PipelineError::Detector)?;
        candidates.retain(|c| c.confidence >= self.min_confidence);
        debug!(frame, candidates = candidates.len(), "detector returned");

        let outcome = reconcile(
            previous.as_ref(),
            &manual,
            candidates,
            &mut self.registry,
            &self.matcher,
        );

        self.store.save(frame, &outcome.records)?;
        for track_id in outcome.records.track_ids() {
            if !manual.contains(track_id) {
                self.registry.register(track_id);
            }
        }

        Ok(outcome)
    }

    /// Commit a human-drawn or human-edited box. Manual placement confirms
    /// the record's class for the sticky-class rule.
    pub fn add_manual_record(
        &mut self,
        frame: usize,
        record: AnnotationRecord,
    ) -> Result<(), StoreError> {
        let (mut records, _) = self.store.load(frame)?;
        let replaced = records.insert(record);
        self.store.save(frame, &records)?;

        if replaced.is_none() {
            self.registry.register(record.track_id);
        }
        self.registry.confirm_class(record.track_id, record.class_id);
        Ok(())
    }

    /// Delete one record. Returns false when the track had no record in
    /// this frame. The registry prunes the id once its last record goes.
    pub fn remove_record(&mut self, frame: usize, track_id: u64) -> Result<bool, StoreError> {
        let (mut records, _) = self.store.load(frame)?;
        if records.remove(track_id).is_none() {
            return Ok(false);
        }
        self.store.save(frame, &records)?;
        self.registry.on_record_removed(track_id);
        Ok(true)
    }

    /// Fill the gap between two keyframes of one track.
    pub fn interpolate(
        &mut self,
        track_id: u64,
        start: usize,
        end: usize,
    ) -> Result<usize, InterpolateError> {
        interpolate(&self.store, &mut self.registry, track_id, start, end)
    }

    /// Fill every keyframe gap of every track.
    pub fn interpolate_all(&mut self) -> Result<InterpolateAllReport, StoreError> {
        interpolate_all(&self.store, &mut self.registry)
    }

    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    /// Read-only view of the live tracks, for UI list projections.
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}
