//! The [`SpatialMap`] aggregate root.
//!
//! A map owns every reference, connection and region of one signing
//! session. References live in an id-keyed arena ([`IndexMap`], so
//! iteration follows insertion order); connections are an edge list of
//! ids. All mutators keep [`MapStatistics`] exact and bump the map's
//! [`Revision`], which downstream caches key on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::connection::SpatialConnection;
use crate::error::SpatialError;
use crate::id::{ConnectionId, MapId, ReferenceId, Revision, Timestamp};
use crate::reference::{ReferencePatch, SpatialReference};
use crate::region::SpatialRegion;
use crate::vector::SpatialVector;

/// Linguistic complexity the session targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Few referents, simple placements.
    Basic,
    /// Default.
    #[default]
    Intermediate,
    /// Dense layouts with many relationships.
    Advanced,
    /// Unrestricted.
    Expert,
}

/// Discourse context a map was created for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapContext {
    /// Conversation topic.
    pub topic: String,
    /// Signing session the map belongs to.
    pub session_id: String,
    /// Target complexity.
    pub complexity_level: ComplexityLevel,
    /// Optional anchor for the session's timeline (e.g. "past", "2024").
    pub time_reference: Option<String>,
}

impl MapContext {
    /// Context without a time reference.
    pub fn new(
        topic: impl Into<String>,
        session_id: impl Into<String>,
        complexity_level: ComplexityLevel,
    ) -> Self {
        Self {
            topic: topic.into(),
            session_id: session_id.into(),
            complexity_level,
            time_reference: None,
        }
    }
}

/// Running counts, exact after every mutation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapStatistics {
    /// Live references.
    pub reference_count: usize,
    /// Live connections.
    pub connection_count: usize,
    /// Live references in [`ActivationState::Active`](crate::ActivationState::Active).
    pub active_reference_count: usize,
    /// Regions.
    pub region_count: usize,
}

/// Timestamps, revision and statistics of a map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    /// Creation time.
    pub created_at: Timestamp,
    /// Time of the last mutation.
    pub updated_at: Timestamp,
    /// Number of mutations committed since creation.
    pub revision: Revision,
    /// Running counts.
    pub statistics: MapStatistics,
}

/// A reference removed from a map together with its cascaded connections.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedReference {
    /// The removed reference.
    pub reference: SpatialReference,
    /// Connections that had it as source or target.
    pub connections: Vec<SpatialConnection>,
}

/// Aggregate of one signing session's spatial layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialMap {
    id: MapId,
    references: IndexMap<ReferenceId, SpatialReference>,
    connections: Vec<SpatialConnection>,
    regions: Vec<SpatialRegion>,
    context: MapContext,
    metadata: MapMetadata,
}

impl SpatialMap {
    /// An empty map with a freshly generated id.
    pub fn new(context: MapContext) -> Self {
        Self::with_id(MapId::generate(), context)
    }

    /// An empty map with the given id.
    pub fn with_id(id: MapId, context: MapContext) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            references: IndexMap::new(),
            connections: Vec::new(),
            regions: Vec::new(),
            context,
            metadata: MapMetadata {
                created_at: now,
                updated_at: now,
                revision: Revision::default(),
                statistics: MapStatistics::default(),
            },
        }
    }

    // ── Read access ─────────────────────────────────────────────

    /// Map identity.
    pub fn id(&self) -> &MapId {
        &self.id
    }

    /// Session context.
    pub fn context(&self) -> &MapContext {
        &self.context
    }

    /// Timestamps, revision and statistics.
    pub fn metadata(&self) -> &MapMetadata {
        &self.metadata
    }

    /// Running counts.
    pub fn statistics(&self) -> &MapStatistics {
        &self.metadata.statistics
    }

    /// Current revision.
    pub fn revision(&self) -> Revision {
        self.metadata.revision
    }

    /// References in insertion order.
    pub fn references(&self) -> impl ExactSizeIterator<Item = &SpatialReference> + '_ {
        self.references.values()
    }

    /// Look up a reference.
    pub fn reference(&self, id: &ReferenceId) -> Option<&SpatialReference> {
        self.references.get(id)
    }

    /// Whether a live reference has this id.
    pub fn contains_reference(&self, id: &ReferenceId) -> bool {
        self.references.contains_key(id)
    }

    /// Connections in creation order.
    pub fn connections(&self) -> &[SpatialConnection] {
        &self.connections
    }

    /// Look up a connection.
    pub fn connection(&self, id: &ConnectionId) -> Option<&SpatialConnection> {
        self.connections.iter().find(|c| &c.id == id)
    }

    /// Regions in creation order.
    pub fn regions(&self) -> &[SpatialRegion] {
        &self.regions
    }

    // ── Mutation ────────────────────────────────────────────────

    /// Add a reference.
    ///
    /// # Errors
    ///
    /// [`SpatialError::DuplicateReference`] if the id is already live.
    pub fn insert_reference(&mut self, reference: SpatialReference) -> Result<(), SpatialError> {
        if self.references.contains_key(&reference.id) {
            return Err(SpatialError::DuplicateReference {
                map_id: self.id.clone(),
                reference_id: reference.id,
            });
        }
        self.references.insert(reference.id.clone(), reference);
        self.commit();
        Ok(())
    }

    /// Apply a patch to a reference and return the updated value.
    ///
    /// # Errors
    ///
    /// [`SpatialError::ReferenceNotFound`] if the id is not live.
    pub fn update_reference(
        &mut self,
        id: &ReferenceId,
        patch: ReferencePatch,
    ) -> Result<&SpatialReference, SpatialError> {
        let now = Timestamp::now_at_least(self.metadata.updated_at);
        let map_id = &self.id;
        let reference = self
            .references
            .get_mut(id)
            .ok_or_else(|| SpatialError::ReferenceNotFound {
                map_id: map_id.clone(),
                reference_id: id.clone(),
            })?;
        patch.apply(reference, now);
        self.commit();
        Ok(&self.references[id])
    }

    /// Move a reference. Returns `false` if the id is not live.
    pub fn set_reference_position(&mut self, id: &ReferenceId, position: SpatialVector) -> bool {
        let now = Timestamp::now_at_least(self.metadata.updated_at);
        match self.references.get_mut(id) {
            Some(r) => {
                r.position = position;
                r.updated_at = now.max(r.created_at);
                self.commit();
                true
            }
            None => false,
        }
    }

    /// Move several references as one mutation. Unknown ids are skipped.
    ///
    /// Returns the ids that actually moved; the revision is bumped only
    /// if that list is non-empty.
    pub fn move_references<I>(&mut self, moves: I) -> Vec<ReferenceId>
    where
        I: IntoIterator<Item = (ReferenceId, SpatialVector)>,
    {
        let now = Timestamp::now_at_least(self.metadata.updated_at);
        let mut moved = Vec::new();
        for (id, position) in moves {
            if let Some(r) = self.references.get_mut(&id) {
                r.position = position;
                r.updated_at = now.max(r.created_at);
                moved.push(id);
            }
        }
        if !moved.is_empty() {
            self.commit();
        }
        moved
    }

    /// Remove a reference, cascading to every connection that touches it
    /// and to region membership lists.
    ///
    /// # Errors
    ///
    /// [`SpatialError::ReferenceNotFound`] if the id is not live.
    pub fn remove_reference(&mut self, id: &ReferenceId) -> Result<RemovedReference, SpatialError> {
        let reference =
            self.references
                .shift_remove(id)
                .ok_or_else(|| SpatialError::ReferenceNotFound {
                    map_id: self.id.clone(),
                    reference_id: id.clone(),
                })?;
        let (cascaded, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.touches(id));
        self.connections = kept;
        for region in &mut self.regions {
            region.reference_ids.retain(|r| r != id);
        }
        self.commit();
        Ok(RemovedReference {
            reference,
            connections: cascaded,
        })
    }

    /// Add a connection between two live references.
    ///
    /// # Errors
    ///
    /// [`SpatialError::ReferenceNotFound`] naming the first missing endpoint.
    pub fn insert_connection(&mut self, connection: SpatialConnection) -> Result<(), SpatialError> {
        for endpoint in [&connection.source_id, &connection.target_id] {
            if !self.references.contains_key(endpoint) {
                return Err(SpatialError::ReferenceNotFound {
                    map_id: self.id.clone(),
                    reference_id: endpoint.clone(),
                });
            }
        }
        self.connections.push(connection);
        self.commit();
        Ok(())
    }

    /// Remove a connection. Returns `None` if it does not exist.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Option<SpatialConnection> {
        let idx = self.connections.iter().position(|c| &c.id == id)?;
        let removed = self.connections.remove(idx);
        self.commit();
        Some(removed)
    }

    /// Add a region.
    pub fn insert_region(&mut self, region: SpatialRegion) {
        self.regions.push(region);
        self.commit();
    }

    /// Recount statistics, bump the revision and stamp `updated_at`.
    fn commit(&mut self) {
        let stats = &mut self.metadata.statistics;
        stats.reference_count = self.references.len();
        stats.active_reference_count = self.references.values().filter(|r| r.is_active()).count();
        stats.connection_count = self.connections.len();
        stats.region_count = self.regions.len();
        self.metadata.revision = self.metadata.revision.next();
        self.metadata.updated_at = Timestamp::now_at_least(self.metadata.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionOptions, RelationType};
    use crate::reference::{ActivationState, ReferenceDraft, ReferenceType};
    use crate::region::RegionDraft;
    use proptest::prelude::*;

    fn map() -> SpatialMap {
        SpatialMap::new(MapContext::new("family", "s1", ComplexityLevel::Basic))
    }

    fn reference(id: &str, x: f64) -> SpatialReference {
        ReferenceDraft::new(ReferenceType::Person, SpatialVector::new(x, 0.0, 0.0))
            .with_id(id)
            .into_reference(Timestamp::now())
    }

    fn connect(m: &mut SpatialMap, a: &str, b: &str) -> ConnectionId {
        let c = ConnectionOptions::default().into_connection(a.into(), b.into(), RelationType::Semantic);
        let id = c.id.clone();
        m.insert_connection(c).unwrap();
        id
    }

    #[test]
    fn new_map_is_empty() {
        let m = map();
        assert_eq!(*m.statistics(), MapStatistics::default());
        assert_eq!(m.revision(), Revision(0));
        assert!(m.metadata().updated_at >= m.metadata().created_at);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut m = map();
        m.insert_reference(reference("a", 0.0)).unwrap();
        let err = m.insert_reference(reference("a", 1.0)).unwrap_err();
        assert!(matches!(err, SpatialError::DuplicateReference { .. }));
        assert_eq!(m.statistics().reference_count, 1);
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut m = map();
        m.insert_reference(reference("a", 0.0)).unwrap();
        assert_eq!(m.revision(), Revision(1));
        m.set_reference_position(&"a".into(), SpatialVector::new(2.0, 0.0, 0.0));
        assert_eq!(m.revision(), Revision(2));
        m.insert_region(RegionDraft::sphere("r", SpatialVector::ZERO, 1.0).into_region());
        assert_eq!(m.revision(), Revision(3));
        assert_eq!(m.statistics().region_count, 1);
    }

    #[test]
    fn active_count_tracks_state_changes() {
        let mut m = map();
        m.insert_reference(reference("a", 0.0)).unwrap();
        m.insert_reference(reference("b", 1.0)).unwrap();
        assert_eq!(m.statistics().active_reference_count, 2);
        m.update_reference(
            &"a".into(),
            ReferencePatch::activation_state(ActivationState::Inactive),
        )
        .unwrap();
        assert_eq!(m.statistics().active_reference_count, 1);
    }

    #[test]
    fn connection_requires_live_endpoints() {
        let mut m = map();
        m.insert_reference(reference("a", 0.0)).unwrap();
        let c = ConnectionOptions::default().into_connection(
            "a".into(),
            "ghost".into(),
            RelationType::Spatial,
        );
        let err = m.insert_connection(c).unwrap_err();
        assert_eq!(
            err,
            SpatialError::ReferenceNotFound {
                map_id: m.id().clone(),
                reference_id: "ghost".into(),
            }
        );
        assert_eq!(m.statistics().connection_count, 0);
    }

    #[test]
    fn remove_cascades_connections_and_membership() {
        let mut m = map();
        for (id, x) in [("a", 0.0), ("b", 1.0), ("c", 2.0)] {
            m.insert_reference(reference(id, x)).unwrap();
        }
        connect(&mut m, "a", "b");
        connect(&mut m, "c", "a");
        let keep = connect(&mut m, "b", "c");
        m.insert_region(
            RegionDraft::sphere("left", SpatialVector::ZERO, 3.0)
                .with_member("a")
                .with_member("b")
                .into_region(),
        );

        let removed = m.remove_reference(&"a".into()).unwrap();
        assert_eq!(removed.connections.len(), 2);
        assert_eq!(m.statistics().connection_count, 1);
        assert_eq!(m.connections()[0].id, keep);
        assert_eq!(m.regions()[0].reference_ids, vec![ReferenceId::new("b")]);
    }

    #[test]
    fn batch_move_commits_once() {
        let mut m = map();
        m.insert_reference(reference("a", 0.0)).unwrap();
        m.insert_reference(reference("b", 1.0)).unwrap();
        let before = m.revision();
        let moved = m.move_references([
            ("a".into(), SpatialVector::new(-1.0, 0.0, 0.0)),
            ("ghost".into(), SpatialVector::ZERO),
            ("b".into(), SpatialVector::new(2.0, 0.0, 0.0)),
        ]);
        assert_eq!(moved, vec![ReferenceId::new("a"), ReferenceId::new("b")]);
        assert_eq!(m.revision(), before.next());
        assert_eq!(m.reference(&"b".into()).unwrap().position.x, 2.0);

        assert!(m.move_references(Vec::new()).is_empty());
        assert_eq!(m.revision(), before.next());
    }

    #[test]
    fn remove_missing_connection_is_none() {
        let mut m = map();
        let before = m.revision();
        assert!(m.remove_connection(&"nope".into()).is_none());
        assert_eq!(m.revision(), before);
    }

    proptest! {
        #[test]
        fn statistics_match_live_collections(ops in proptest::collection::vec((0u8..3, 0usize..6), 1..60)) {
            let mut m = map();
            for (op, slot) in ops {
                let id = format!("r{slot}");
                match op {
                    0 => { let _ = m.insert_reference(reference(&id, slot as f64)); }
                    1 => { let _ = m.remove_reference(&id.as_str().into()); }
                    _ => {
                        let other = format!("r{}", (slot + 1) % 6);
                        let c = ConnectionOptions::default().into_connection(
                            id.as_str().into(), other.as_str().into(), RelationType::Spatial);
                        let _ = m.insert_connection(c);
                    }
                }
                prop_assert_eq!(m.statistics().reference_count, m.references().len());
                prop_assert_eq!(m.statistics().connection_count, m.connections().len());
                for c in m.connections() {
                    prop_assert!(m.contains_reference(&c.source_id));
                    prop_assert!(m.contains_reference(&c.target_id));
                }
            }
        }
    }
}
