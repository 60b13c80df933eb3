//! Process-wide registry of live track identities.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::annotation::store::{LabelStore, StoreError};

/// The registry diverged from what exists on disk. Internal assertion only:
/// this cannot happen as long as every deletion path calls
/// [`TrackRegistry::on_record_removed`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("track registry out of sync: ghost ids {ghosts:?}, missing ids {missing:?}")]
pub struct GhostInvariantViolation {
    /// Ids the registry holds with no remaining record on disk
    pub ghosts: Vec<u64>,
    /// Ids present on disk that the registry does not know
    pub missing: Vec<u64>,
}

/// Why an audit did not come back clean. An unreadable frame is an I/O
/// problem, not a divergence: the two cases must stay distinguishable
/// because a divergence is a programming defect.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Divergence(#[from] GhostInvariantViolation),
}

/// Derived state over the whole label directory: which track ids are live
/// (have at least one record in any frame), how many records each has, and
/// the most recently confirmed class per track.
///
/// Initialized empty, seeded by a full directory scan when a label
/// directory is opened, discarded when it closes. Counts are maintained
/// incrementally: every record insertion goes through [`register`] and
/// every removal through [`on_record_removed`], so a track whose last
/// record disappears is pruned immediately (no ghost ids).
///
/// [`register`]: TrackRegistry::register
/// [`on_record_removed`]: TrackRegistry::on_record_removed
#[derive(Debug, Clone, Default)]
pub struct TrackRegistry {
    ref_counts: HashMap<u64, usize>,
    confirmed_class: HashMap<u64, u32>,
    highest_id: u64,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from everything currently on disk.
    pub fn seed_from_store(store: &LabelStore) -> Result<Self, StoreError> {
        let mut registry = Self::new();
        for frame in store.scan() {
            let (_, records) = frame?;
            for record in records.iter() {
                registry.register(record.track_id);
                registry.confirm_class(record.track_id, record.class_id);
            }
        }
        debug!(
            live = registry.ref_counts.len(),
            highest = registry.highest_id,
            "seeded track registry"
        );
        Ok(registry)
    }

    /// Account for one new record of `track_id` somewhere in the dataset.
    pub fn register(&mut self, track_id: u64) {
        *self.ref_counts.entry(track_id).or_insert(0) += 1;
        self.highest_id = self.highest_id.max(track_id);
    }

    /// Account for one removed record of `track_id`. When the last record
    /// goes, the id leaves the live set.
    pub fn on_record_removed(&mut self, track_id: u64) {
        if let Some(count) = self.ref_counts.get_mut(&track_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.ref_counts.remove(&track_id);
                self.confirmed_class.remove(&track_id);
                debug!(track_id, "pruned track with no remaining records");
            }
        }
    }

    /// Remember the class most recently confirmed for `track_id`. Feeds the
    /// matcher's sticky-class override.
    pub fn confirm_class(&mut self, track_id: u64, class_id: u32) {
        self.confirmed_class.insert(track_id, class_id);
    }

    pub fn confirmed_class(&self, track_id: u64) -> Option<u32> {
        self.confirmed_class.get(&track_id).copied()
    }

    pub fn is_live(&self, track_id: u64) -> bool {
        self.ref_counts.contains_key(&track_id)
    }

    pub fn all_live_ids(&self) -> BTreeSet<u64> {
        self.ref_counts.keys().copied().collect()
    }

    /// An id strictly greater than any id ever observed or issued, so
    /// auto-allocated tracks never collide with prior ids, including
    /// arbitrary user-chosen ones.
    pub fn next_fresh_id(&mut self) -> u64 {
        self.highest_id += 1;
        self.highest_id
    }

    /// Recompute the live set from disk and compare. Programming-defect
    /// detector for tests and debug builds, not a user-facing operation.
    /// A frame that cannot be read aborts the audit; its tracks must not
    /// be counted as ghosts.
    pub fn audit(&self, store: &LabelStore) -> Result<(), AuditError> {
        let mut on_disk = BTreeSet::new();
        for frame in store.scan() {
            let (_, records) = frame?;
            on_disk.extend(records.track_ids());
        }
        let live = self.all_live_ids();

        let ghosts: Vec<u64> = live.difference(&on_disk).copied().collect();
        let missing: Vec<u64> = on_disk.difference(&live).copied().collect();

        if ghosts.is_empty() && missing.is_empty() {
            Ok(())
        } else {
            Err(GhostInvariantViolation { ghosts, missing }.into())
        }
    }
}
