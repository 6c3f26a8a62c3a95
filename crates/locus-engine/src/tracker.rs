//! Secondary indices over the live references of one map.
//!
//! The tracker is an accelerator, not a source of truth: the owning
//! [`SpatialMap`] decides what exists, and every tracker operation on an
//! unknown id is a silent no-op. It keeps
//!
//! - a type index (`ReferenceType -> ids`, insertion ordered),
//! - a uniform grid of cubic buckets for proximity candidates,
//! - usage recency and frequency from [`mark_reference_as_used`].
//!
//! [`mark_reference_as_used`]: ReferenceTracker::mark_reference_as_used

use std::collections::HashMap;

use indexmap::IndexSet;
use locus_core::{ReferenceId, ReferenceType, SpatialMap, SpatialReference, SpatialVector};
use smallvec::SmallVec;

/// Integer coordinates of a grid bucket.
pub type BucketKey = [i64; 3];

type Bucket = SmallVec<[ReferenceId; 4]>;

/// How often and how recently a reference was used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Number of [`ReferenceTracker::mark_reference_as_used`] calls.
    pub use_count: u64,
    /// Tracker-local logical time of the last use; 0 if never used.
    pub last_used: u64,
}

#[derive(Clone, Debug)]
struct Tracked {
    reference_type: ReferenceType,
    bucket: BucketKey,
    usage: UsageStats,
}

/// Type and grid indices plus usage counters for one map.
#[derive(Clone, Debug)]
pub struct ReferenceTracker {
    bucket_size: f64,
    tracked: HashMap<ReferenceId, Tracked>,
    by_type: HashMap<ReferenceType, IndexSet<ReferenceId>>,
    buckets: HashMap<BucketKey, Bucket>,
    clock: u64,
}

impl ReferenceTracker {
    /// An empty tracker. `bucket_size` must be positive and finite;
    /// [`ManagerConfig::validate`](crate::ManagerConfig::validate) checks it.
    pub fn new(bucket_size: f64) -> Self {
        Self {
            bucket_size,
            tracked: HashMap::new(),
            by_type: HashMap::new(),
            buckets: HashMap::new(),
            clock: 0,
        }
    }

    /// A tracker indexing every reference of `map`.
    pub fn for_map(map: &SpatialMap, bucket_size: f64) -> Self {
        let mut tracker = Self::new(bucket_size);
        for reference in map.references() {
            tracker.track_reference(reference);
        }
        tracker
    }

    /// Grid bucket containing `position`.
    pub fn bucket_of(&self, position: SpatialVector) -> BucketKey {
        let cell = |v: f64| (v / self.bucket_size).floor() as i64;
        [cell(position.x), cell(position.y), cell(position.z)]
    }

    /// Number of tracked references.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Whether `id` is tracked.
    pub fn contains(&self, id: &ReferenceId) -> bool {
        self.tracked.contains_key(id)
    }

    // ── Registration ────────────────────────────────────────────

    /// Index `reference`. Re-tracking a known id re-indexes its type and
    /// position and keeps its usage counters.
    pub fn track_reference(&mut self, reference: &SpatialReference) {
        let bucket = self.bucket_of(reference.position);
        let usage = match self.tracked.get(&reference.id) {
            Some(previous) => {
                let (old_type, old_bucket, usage) =
                    (previous.reference_type, previous.bucket, previous.usage);
                self.unindex(&reference.id, old_type, old_bucket);
                usage
            }
            None => UsageStats::default(),
        };
        self.by_type
            .entry(reference.reference_type)
            .or_default()
            .insert(reference.id.clone());
        self.buckets
            .entry(bucket)
            .or_default()
            .push(reference.id.clone());
        self.tracked.insert(
            reference.id.clone(),
            Tracked {
                reference_type: reference.reference_type,
                bucket,
                usage,
            },
        );
    }

    /// Forget `id`. Returns `false` if it was not tracked.
    pub fn stop_tracking(&mut self, id: &ReferenceId) -> bool {
        match self.tracked.remove(id) {
            Some(t) => {
                self.unindex(id, t.reference_type, t.bucket);
                true
            }
            None => false,
        }
    }

    /// Move `id` to the bucket of `position`. Returns `false` if untracked.
    pub fn update_tracking(&mut self, id: &ReferenceId, position: SpatialVector) -> bool {
        let bucket = self.bucket_of(position);
        let Some(tracked) = self.tracked.get_mut(id) else {
            return false;
        };
        let old = std::mem::replace(&mut tracked.bucket, bucket);
        if old != bucket {
            remove_from_bucket(&mut self.buckets, old, id);
            self.buckets.entry(bucket).or_default().push(id.clone());
        }
        true
    }

    /// Drop every index entry.
    pub fn clear(&mut self) {
        self.tracked.clear();
        self.by_type.clear();
        self.buckets.clear();
        self.clock = 0;
    }

    fn unindex(&mut self, id: &ReferenceId, reference_type: ReferenceType, bucket: BucketKey) {
        if let Some(ids) = self.by_type.get_mut(&reference_type) {
            ids.shift_remove(id);
            if ids.is_empty() {
                self.by_type.remove(&reference_type);
            }
        }
        remove_from_bucket(&mut self.buckets, bucket, id);
    }

    // ── Usage ───────────────────────────────────────────────────

    /// Record a use of `id`. Returns `false` if untracked.
    pub fn mark_reference_as_used(&mut self, id: &ReferenceId) -> bool {
        let Some(tracked) = self.tracked.get_mut(id) else {
            return false;
        };
        self.clock += 1;
        tracked.usage.use_count += 1;
        tracked.usage.last_used = self.clock;
        true
    }

    /// Usage counters of `id`.
    pub fn usage(&self, id: &ReferenceId) -> Option<UsageStats> {
        self.tracked.get(id).map(|t| t.usage)
    }

    /// Up to `limit` used references, most used first; ties go to the
    /// most recently used. Never-used references are excluded.
    pub fn most_used(&self, limit: usize) -> Vec<ReferenceId> {
        let mut used: Vec<(&ReferenceId, UsageStats)> = self
            .tracked
            .iter()
            .filter(|(_, t)| t.usage.use_count > 0)
            .map(|(id, t)| (id, t.usage))
            .collect();
        used.sort_by(|a, b| {
            b.1.use_count
                .cmp(&a.1.use_count)
                .then(b.1.last_used.cmp(&a.1.last_used))
        });
        used.into_iter().take(limit).map(|(id, _)| id.clone()).collect()
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Ids of the given type, in tracking order.
    pub fn references_of_type(&self, reference_type: ReferenceType) -> impl Iterator<Item = &ReferenceId> + '_ {
        self.by_type.get(&reference_type).into_iter().flatten()
    }

    /// Ids in every bucket intersecting the axis-aligned box of half-width
    /// `radius` around `center`.
    ///
    /// A superset of the references within `radius`; callers filter by
    /// exact distance. A negative or NaN radius yields nothing.
    pub fn candidates_near(&self, center: SpatialVector, radius: f64) -> Vec<ReferenceId> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        let offset = SpatialVector::new(radius, radius, radius);
        let lo = self.bucket_of(center - offset);
        let hi = self.bucket_of(center + offset);
        let in_range = |key: &BucketKey| (0..3).all(|axis| lo[axis] <= key[axis] && key[axis] <= hi[axis]);

        let span: u128 = (0..3)
            .map(|axis| (i128::from(hi[axis]) - i128::from(lo[axis]) + 1) as u128)
            .fold(1u128, u128::saturating_mul);

        let mut out = Vec::new();
        if span > self.buckets.len() as u128 {
            for (key, ids) in &self.buckets {
                if in_range(key) {
                    out.extend(ids.iter().cloned());
                }
            }
        } else {
            for x in lo[0]..=hi[0] {
                for y in lo[1]..=hi[1] {
                    for z in lo[2]..=hi[2] {
                        if let Some(ids) = self.buckets.get(&[x, y, z]) {
                            out.extend(ids.iter().cloned());
                        }
                    }
                }
            }
        }
        out
    }
}

fn remove_from_bucket(buckets: &mut HashMap<BucketKey, Bucket>, key: BucketKey, id: &ReferenceId) {
    if let Some(ids) = buckets.get_mut(&key) {
        ids.retain(|other| other != id);
        if ids.is_empty() {
            buckets.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::{ReferenceDraft, Timestamp};

    fn reference(id: &str, t: ReferenceType, x: f64, y: f64, z: f64) -> SpatialReference {
        ReferenceDraft::new(t, SpatialVector::new(x, y, z))
            .with_id(id)
            .into_reference(Timestamp::now())
    }

    fn sorted(mut ids: Vec<ReferenceId>) -> Vec<ReferenceId> {
        ids.sort();
        ids
    }

    #[test]
    fn buckets_floor_negative_coordinates() {
        let t = ReferenceTracker::new(1.0);
        assert_eq!(t.bucket_of(SpatialVector::new(-0.5, 0.5, 1.0)), [-1, 0, 1]);
        let t = ReferenceTracker::new(0.25);
        assert_eq!(t.bucket_of(SpatialVector::new(0.6, -0.1, 0.0)), [2, -1, 0]);
    }

    #[test]
    fn type_index_follows_tracking() {
        let mut t = ReferenceTracker::new(1.0);
        t.track_reference(&reference("p1", ReferenceType::Person, 0.0, 0.0, 0.0));
        t.track_reference(&reference("o1", ReferenceType::Object, 0.0, 0.0, 0.0));
        t.track_reference(&reference("p2", ReferenceType::Person, 3.0, 0.0, 0.0));
        let people: Vec<_> = t.references_of_type(ReferenceType::Person).cloned().collect();
        assert_eq!(people, vec![ReferenceId::new("p1"), ReferenceId::new("p2")]);

        assert!(t.stop_tracking(&"p1".into()));
        assert!(!t.stop_tracking(&"p1".into()));
        assert_eq!(t.references_of_type(ReferenceType::Person).count(), 1);
        assert_eq!(t.references_of_type(ReferenceType::Group).count(), 0);
    }

    #[test]
    fn retracking_changes_type_and_keeps_usage() {
        let mut t = ReferenceTracker::new(1.0);
        let mut r = reference("a", ReferenceType::Person, 0.0, 0.0, 0.0);
        t.track_reference(&r);
        t.mark_reference_as_used(&r.id);
        r.reference_type = ReferenceType::Group;
        r.position = SpatialVector::new(5.0, 0.0, 0.0);
        t.track_reference(&r);

        assert_eq!(t.len(), 1);
        assert_eq!(t.references_of_type(ReferenceType::Person).count(), 0);
        assert_eq!(t.references_of_type(ReferenceType::Group).count(), 1);
        assert_eq!(t.usage(&r.id).unwrap().use_count, 1);
        assert!(t.candidates_near(SpatialVector::ZERO, 0.5).is_empty());
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut t = ReferenceTracker::new(1.0);
        t.track_reference(&reference("a", ReferenceType::Object, 0.5, 0.5, 0.5));
        assert_eq!(t.candidates_near(SpatialVector::new(0.5, 0.5, 0.5), 0.1).len(), 1);

        assert!(t.update_tracking(&"a".into(), SpatialVector::new(10.5, 0.5, 0.5)));
        assert!(t.candidates_near(SpatialVector::new(0.5, 0.5, 0.5), 0.1).is_empty());
        assert_eq!(
            t.candidates_near(SpatialVector::new(10.5, 0.5, 0.5), 0.1),
            vec![ReferenceId::new("a")]
        );
    }

    #[test]
    fn untracked_ids_are_no_ops() {
        let mut t = ReferenceTracker::new(1.0);
        let ghost = ReferenceId::new("ghost");
        assert!(!t.update_tracking(&ghost, SpatialVector::ZERO));
        assert!(!t.mark_reference_as_used(&ghost));
        assert!(!t.stop_tracking(&ghost));
        assert_eq!(t.usage(&ghost), None);
        assert!(t.is_empty());
    }

    #[test]
    fn candidates_cover_neighbouring_buckets() {
        let mut t = ReferenceTracker::new(1.0);
        t.track_reference(&reference("near", ReferenceType::Object, 1.05, 0.0, 0.0));
        t.track_reference(&reference("far", ReferenceType::Object, 4.0, 0.0, 0.0));
        // Centre sits in bucket 0; the 0.2 box reaches into bucket 1.
        let found = t.candidates_near(SpatialVector::new(0.9, 0.0, 0.0), 0.2);
        assert_eq!(found, vec![ReferenceId::new("near")]);
    }

    #[test]
    fn huge_radius_scans_occupied_buckets() {
        let mut t = ReferenceTracker::new(0.001);
        t.track_reference(&reference("a", ReferenceType::Object, -100.0, 0.0, 0.0));
        t.track_reference(&reference("b", ReferenceType::Object, 100.0, 50.0, -3.0));
        let found = sorted(t.candidates_near(SpatialVector::ZERO, f64::INFINITY));
        assert_eq!(found, vec![ReferenceId::new("a"), ReferenceId::new("b")]);
        assert!(t.candidates_near(SpatialVector::ZERO, f64::NAN).is_empty());
        assert!(t.candidates_near(SpatialVector::ZERO, -1.0).is_empty());
    }

    #[test]
    fn most_used_orders_by_count_then_recency() {
        let mut t = ReferenceTracker::new(1.0);
        for id in ["a", "b", "c", "d"] {
            t.track_reference(&reference(id, ReferenceType::Concept, 0.0, 0.0, 0.0));
        }
        for id in ["a", "b", "b", "c", "a"] {
            t.mark_reference_as_used(&id.into());
        }
        // a and b have two uses; a was used last. c has one, d none.
        assert_eq!(
            t.most_used(10),
            vec![ReferenceId::new("a"), ReferenceId::new("b"), ReferenceId::new("c")]
        );
        assert_eq!(t.most_used(1), vec![ReferenceId::new("a")]);
    }
}
