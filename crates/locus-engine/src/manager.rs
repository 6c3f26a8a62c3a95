//! The [`SpatialManager`] orchestrator.
//!
//! Map lifecycle: created, then populated (references, connections and
//! regions mutate freely), then discarded. A discarded id is never reused;
//! every operation against it fails with [`SpatialError::MapNotFound`].
//!
//! Every mutation runs under the map's write lock and, in order:
//! 1. commits to the [`SpatialMap`] (statistics and revision update),
//! 2. updates the map's [`ReferenceTracker`],
//! 3. drops cached results computed against older revisions,
//! 4. queues its events on the map's outbox,
//! 5. releases the lock and delivers queued events in commit order.
//!
//! Discarding a map marks its state under the write lock, so a caller
//! still holding the map can neither mutate it nor cache results for it.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver};
use locus_cache::{CacheStats, MultiLevelCache};
use locus_coherence::{calculate_distance, CoherenceValidator};
use locus_core::{
    CancellationToken, CoherenceReport, ComplexityLevel, ConnectionId, ConnectionOptions,
    MapContext, MapId, ReferenceDraft, ReferenceId, ReferencePatch, ReferenceType, RegionDraft,
    RelationType, Revision, SpatialConnection, SpatialError, SpatialEvent, SpatialEventType,
    SpatialMap, SpatialReference, SpatialRegion, SpatialVector, Timestamp,
};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, ManagerConfig};
use crate::events::{EventBus, Outbox, Subscription};
use crate::layout::repulsion_moves;
use crate::query::{CachedResult, QueryKey};
use crate::tracker::ReferenceTracker;

/// A reference found by proximity search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProximityMatch {
    /// Snapshot of the reference.
    pub reference: SpatialReference,
    /// Distance from the query position.
    pub distance: f64,
}

/// Outcome of a layout optimisation or correction pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutReport {
    /// References that moved, in map order.
    pub moved: Vec<ReferenceId>,
    /// Map revision after the pass.
    pub revision: Revision,
}

struct MapState {
    map: SpatialMap,
    tracker: ReferenceTracker,
    discarded: bool,
}

struct MapSlot {
    state: RwLock<MapState>,
    outbox: Outbox,
}

impl MapSlot {
    fn read(&self) -> RwLockReadGuard<'_, MapState> {
        self.state.read()
    }

    /// Write access, refused once the map has been discarded.
    fn write(&self) -> Result<RwLockWriteGuard<'_, MapState>, SpatialError> {
        let guard = self.state.write();
        if guard.discarded {
            return Err(SpatialError::MapNotFound {
                map_id: guard.map.id().clone(),
            });
        }
        Ok(guard)
    }
}

type SharedState = Arc<MapSlot>;

/// Owner of every live spatial map.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct SpatialManager {
    config: ManagerConfig,
    maps: RwLock<HashMap<MapId, SharedState>>,
    cache: MultiLevelCache<QueryKey, CachedResult>,
    validator: CoherenceValidator,
    events: Arc<EventBus>,
}

// Compile-time assertion: SpatialManager must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<SpatialManager>();
};

fn event<T: Serialize>(
    map_id: &MapId,
    event_type: SpatialEventType,
    reference_id: Option<ReferenceId>,
    data: &T,
) -> SpatialEvent {
    let data = serde_json::to_value(data).unwrap_or_default();
    SpatialEvent::new(event_type, map_id.clone(), reference_id, data)
}

impl SpatialManager {
    /// Build a manager from a validated configuration.
    ///
    /// # Errors
    ///
    /// See [`ManagerConfig::validate`].
    pub fn new(config: ManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let cache = MultiLevelCache::new(config.cache.clone())?.with_pattern_key(QueryKey::pattern);
        let validator = CoherenceValidator::new(config.coherence.clone())?;
        Ok(Self {
            config,
            maps: RwLock::new(HashMap::new()),
            cache,
            validator,
            events: Arc::new(EventBus::default()),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The validator used for coherence checks.
    pub fn validator(&self) -> &CoherenceValidator {
        &self.validator
    }

    fn state(&self, map_id: &MapId) -> Result<SharedState, SpatialError> {
        self.maps
            .read()
            .get(map_id)
            .cloned()
            .ok_or_else(|| SpatialError::MapNotFound {
                map_id: map_id.clone(),
            })
    }

    /// Drop cached results computed against revisions older than `map`'s.
    fn invalidate(&self, map: &SpatialMap) {
        let (map_id, revision) = (map.id(), map.revision());
        self.cache
            .remove_where(|k| k.map_id() == map_id && k.revision() < revision);
    }

    // ── Map lifecycle ───────────────────────────────────────────

    /// Create an empty map for a signing session.
    pub fn create_spatial_map(
        &self,
        topic: impl Into<String>,
        session_id: impl Into<String>,
        complexity_level: ComplexityLevel,
    ) -> SpatialMap {
        self.create_spatial_map_with(MapContext::new(topic, session_id, complexity_level))
    }

    /// Create an empty map with a full context.
    pub fn create_spatial_map_with(&self, context: MapContext) -> SpatialMap {
        let map = SpatialMap::new(context);
        let snapshot = map.clone();
        let state = MapState {
            map,
            tracker: ReferenceTracker::new(self.config.tracker.bucket_size),
            discarded: false,
        };
        let slot = MapSlot {
            state: RwLock::new(state),
            outbox: Outbox::default(),
        };
        self.maps.write().insert(snapshot.id().clone(), Arc::new(slot));
        info!(
            map_id = %snapshot.id(),
            topic = %snapshot.context().topic,
            session_id = %snapshot.context().session_id,
            "created spatial map"
        );
        snapshot
    }

    /// Snapshot of a map, or `None` if unknown or discarded.
    pub fn get_spatial_map(&self, map_id: &MapId) -> Option<SpatialMap> {
        let shared = self.state(map_id).ok()?;
        let snapshot = shared.read().map.clone();
        Some(snapshot)
    }

    /// Ids of every live map, sorted.
    pub fn map_ids(&self) -> Vec<MapId> {
        let mut ids: Vec<MapId> = self.maps.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Discard a map together with its cached results, learned access
    /// patterns and subscribers. Returns `false` if it was not live.
    pub fn discard_spatial_map(&self, map_id: &MapId) -> bool {
        let Some(shared) = self.maps.write().remove(map_id) else {
            return false;
        };
        shared.state.write().discarded = true;
        let dropped = self.cache.remove_where(|k| k.map_id() == map_id);
        self.cache.forget_patterns_where(|k| k.map_id() == map_id);
        self.events.drop_map(map_id);
        info!(map_id = %map_id, cache_entries = dropped, "discarded spatial map");
        true
    }

    // ── References ──────────────────────────────────────────────

    fn insert_locked(
        &self,
        state: &mut MapState,
        reference: SpatialReference,
    ) -> Result<(), SpatialError> {
        state.map.insert_reference(reference.clone())?;
        state.tracker.track_reference(&reference);
        self.invalidate(&state.map);
        debug!(
            map_id = %state.map.id(),
            reference_id = %reference.id,
            revision = %state.map.revision(),
            "added reference"
        );
        Ok(())
    }

    /// Deliver the events mutations of `shared` have queued.
    fn deliver(&self, map_id: &MapId, shared: &MapSlot) {
        shared.outbox.flush(&self.events, map_id);
    }

    fn added_event(map_id: &MapId, reference: &SpatialReference) -> SpatialEvent {
        event(
            map_id,
            SpatialEventType::ReferenceAdded,
            Some(reference.id.clone()),
            reference,
        )
    }

    /// Add a reference built from `draft`.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`], or
    /// [`SpatialError::DuplicateReference`] if the draft names a live id.
    pub fn add_reference(
        &self,
        map_id: &MapId,
        draft: ReferenceDraft,
    ) -> Result<SpatialReference, SpatialError> {
        let shared = self.state(map_id)?;
        let reference = {
            let mut guard = shared.write()?;
            let state = &mut *guard;
            let reference = draft.into_reference(Timestamp::now_at_least(state.map.metadata().updated_at));
            self.insert_locked(state, reference.clone())?;
            shared.outbox.enqueue(vec![Self::added_event(map_id, &reference)]);
            reference
        };
        self.deliver(map_id, &shared);
        Ok(reference)
    }

    /// Add a reference only if it passes the pre-flight coherence check.
    ///
    /// # Errors
    ///
    /// As [`add_reference`](Self::add_reference), plus
    /// [`SpatialError::ValidationFailure`] carrying the conflicts found.
    pub fn add_reference_validated(
        &self,
        map_id: &MapId,
        draft: ReferenceDraft,
    ) -> Result<SpatialReference, SpatialError> {
        let shared = self.state(map_id)?;
        let reference = {
            let mut guard = shared.write()?;
            let state = &mut *guard;
            let candidate = draft.into_reference(Timestamp::now_at_least(state.map.metadata().updated_at));
            let check = self.validator.validate_reference_addition(&state.map, &candidate);
            if !check.is_valid {
                debug!(
                    map_id = %map_id,
                    issues = check.issues.len(),
                    "rejected reference addition"
                );
                return Err(SpatialError::ValidationFailure {
                    issues: check.issues,
                });
            }
            self.insert_locked(state, candidate.clone())?;
            shared.outbox.enqueue(vec![Self::added_event(map_id, &candidate)]);
            candidate
        };
        self.deliver(map_id, &shared);
        Ok(reference)
    }

    /// Apply `patch` to a reference and return the updated snapshot.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`] or [`SpatialError::ReferenceNotFound`].
    pub fn update_reference(
        &self,
        map_id: &MapId,
        reference_id: &ReferenceId,
        patch: ReferencePatch,
    ) -> Result<SpatialReference, SpatialError> {
        let shared = self.state(map_id)?;
        let updated = {
            let mut guard = shared.write()?;
            let state = &mut *guard;
            let updated = state.map.update_reference(reference_id, patch)?.clone();
            state.tracker.track_reference(&updated);
            self.invalidate(&state.map);
            debug!(
                map_id = %map_id,
                reference_id = %reference_id,
                revision = %state.map.revision(),
                "updated reference"
            );
            shared.outbox.enqueue(vec![event(
                map_id,
                SpatialEventType::ReferenceUpdated,
                Some(reference_id.clone()),
                &updated,
            )]);
            updated
        };
        self.deliver(map_id, &shared);
        Ok(updated)
    }

    /// Remove a reference and every connection touching it.
    ///
    /// Subscribers see one `RELATIONSHIP_REMOVED` per cascaded connection,
    /// then `REFERENCE_REMOVED`.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`] or [`SpatialError::ReferenceNotFound`].
    pub fn remove_reference(
        &self,
        map_id: &MapId,
        reference_id: &ReferenceId,
    ) -> Result<SpatialReference, SpatialError> {
        let shared = self.state(map_id)?;
        let removed = {
            let mut guard = shared.write()?;
            let state = &mut *guard;
            let removed = state.map.remove_reference(reference_id)?;
            state.tracker.stop_tracking(reference_id);
            self.invalidate(&state.map);
            debug!(
                map_id = %map_id,
                reference_id = %reference_id,
                cascaded = removed.connections.len(),
                revision = %state.map.revision(),
                "removed reference"
            );
            let mut events: Vec<SpatialEvent> = removed
                .connections
                .iter()
                .map(|c| {
                    event(
                        map_id,
                        SpatialEventType::RelationshipRemoved,
                        Some(reference_id.clone()),
                        c,
                    )
                })
                .collect();
            events.push(event(
                map_id,
                SpatialEventType::ReferenceRemoved,
                Some(reference_id.clone()),
                &removed.reference,
            ));
            shared.outbox.enqueue(events);
            removed
        };
        self.deliver(map_id, &shared);
        Ok(removed.reference)
    }

    // ── Connections and regions ─────────────────────────────────

    /// Connect two live references.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`], or [`SpatialError::ReferenceNotFound`]
    /// naming the first missing endpoint.
    pub fn connect_references(
        &self,
        map_id: &MapId,
        source_id: &ReferenceId,
        target_id: &ReferenceId,
        relationship: RelationType,
        options: ConnectionOptions,
    ) -> Result<SpatialConnection, SpatialError> {
        let shared = self.state(map_id)?;
        let connection = options.into_connection(source_id.clone(), target_id.clone(), relationship);
        {
            let mut state = shared.write()?;
            state.map.insert_connection(connection.clone())?;
            self.invalidate(&state.map);
            debug!(
                map_id = %map_id,
                connection_id = %connection.id,
                revision = %state.map.revision(),
                "connected references"
            );
            shared.outbox.enqueue(vec![event(
                map_id,
                SpatialEventType::RelationshipCreated,
                Some(source_id.clone()),
                &connection,
            )]);
        }
        self.deliver(map_id, &shared);
        Ok(connection)
    }

    /// Remove a connection. Returns `Ok(false)` if it does not exist.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn disconnect_references(
        &self,
        map_id: &MapId,
        connection_id: &ConnectionId,
    ) -> Result<bool, SpatialError> {
        let shared = self.state(map_id)?;
        {
            let mut state = shared.write()?;
            let Some(connection) = state.map.remove_connection(connection_id) else {
                return Ok(false);
            };
            self.invalidate(&state.map);
            debug!(
                map_id = %map_id,
                connection_id = %connection_id,
                revision = %state.map.revision(),
                "disconnected references"
            );
            shared.outbox.enqueue(vec![event(
                map_id,
                SpatialEventType::RelationshipRemoved,
                Some(connection.source_id.clone()),
                &connection,
            )]);
        }
        self.deliver(map_id, &shared);
        Ok(true)
    }

    /// Add a region with a generated id.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn add_region(&self, map_id: &MapId, draft: RegionDraft) -> Result<SpatialRegion, SpatialError> {
        let shared = self.state(map_id)?;
        let region = draft.into_region();
        let mut state = shared.write()?;
        state.map.insert_region(region.clone());
        self.invalidate(&state.map);
        debug!(map_id = %map_id, region_id = %region.id, "added region");
        Ok(region)
    }

    // ── Cached queries ──────────────────────────────────────────

    /// References within `radius` of `position` (inclusive), nearest
    /// first, optionally of one type. Equal distances order by id.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn find_references_near_position(
        &self,
        map_id: &MapId,
        position: SpatialVector,
        radius: f64,
        reference_type: Option<ReferenceType>,
    ) -> Result<Vec<ProximityMatch>, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        let key = QueryKey::proximity(map_id, state.map.revision(), position, radius, reference_type);
        let result = self.lookup(&state, key, &self.config.routing.proximity);
        Ok(match result {
            CachedResult::Proximity(matches) => matches.to_vec(),
            _ => proximity(&state, position, radius, reference_type),
        })
    }

    /// Connections with `reference_id` as source or target, optionally of
    /// one relationship type. An unknown reference has no connections.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn get_connections_for_reference(
        &self,
        map_id: &MapId,
        reference_id: &ReferenceId,
        relationship: Option<RelationType>,
    ) -> Result<Vec<SpatialConnection>, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        let key = QueryKey::Connections {
            map_id: map_id.clone(),
            revision: state.map.revision(),
            reference_id: reference_id.clone(),
            relationship,
        };
        let result = self.lookup(&state, key, &self.config.routing.connections);
        Ok(match result {
            CachedResult::Connections(connections) => connections.to_vec(),
            _ => connections_of(&state.map, reference_id, relationship),
        })
    }

    /// Coherence report for the current revision of the map.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn validate_spatial_coherence(&self, map_id: &MapId) -> Result<CoherenceReport, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        let key = QueryKey::Coherence {
            map_id: map_id.clone(),
            revision: state.map.revision(),
        };
        Ok(match self.lookup(&state, key, &self.config.routing.coherence) {
            CachedResult::Coherence(report) => (*report).clone(),
            _ => self.validator.validate_spatial_map(&state.map),
        })
    }

    /// [`validate_spatial_coherence`](Self::validate_spatial_coherence)
    /// for very large maps: polls `token` between comparisons. A cancelled
    /// pass caches nothing.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`] or [`SpatialError::Cancelled`].
    pub fn validate_spatial_coherence_with(
        &self,
        map_id: &MapId,
        token: &CancellationToken,
    ) -> Result<CoherenceReport, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        let key = QueryKey::Coherence {
            map_id: map_id.clone(),
            revision: state.map.revision(),
        };
        if let Some(CachedResult::Coherence(report)) = self.cache.get(&key) {
            return Ok((*report).clone());
        }
        let report = self.validator.validate_spatial_map_with(&state.map, token)?;
        self.store(
            &state,
            key,
            CachedResult::Coherence(Arc::new(report.clone())),
            &self.config.routing.coherence,
        );
        Ok(report)
    }

    fn lookup(&self, state: &MapState, key: QueryKey, level: &str) -> CachedResult {
        let result = match self.cache.get(&key) {
            Some(hit) => hit,
            None => {
                let computed = self.compute(state, &key);
                self.store(state, key.clone(), computed.clone(), level);
                computed
            }
        };
        self.preload_predicted(state, &key);
        result
    }

    /// Cache `value` unless the map was discarded while it was computed.
    fn store(&self, state: &MapState, key: QueryKey, value: CachedResult, level: &str) {
        if state.discarded {
            return;
        }
        if let Err(err) = self.cache.set(key, value, level) {
            warn!(%err, "failed to cache query result");
        }
    }

    /// Precompute queries that usually follow `key`, against the current
    /// revision of the same map.
    fn preload_predicted(&self, state: &MapState, key: &QueryKey) {
        if state.discarded {
            return;
        }
        let revision = state.map.revision();
        for predicted in self.cache.predict(key) {
            if predicted.map_id() != state.map.id() {
                continue;
            }
            let predicted = predicted.at_revision(revision);
            if self.cache.contains(&predicted) {
                continue;
            }
            let value = self.compute(state, &predicted);
            if self.cache.preload(predicted, value) {
                trace!(map_id = %state.map.id(), revision = %revision, "preloaded predicted query");
            }
        }
    }

    fn compute(&self, state: &MapState, key: &QueryKey) -> CachedResult {
        match key {
            QueryKey::Proximity {
                position,
                radius,
                reference_type,
                ..
            } => CachedResult::Proximity(
                proximity(
                    state,
                    SpatialVector::from_bits(*position),
                    f64::from_bits(*radius),
                    *reference_type,
                )
                .into(),
            ),
            QueryKey::Connections {
                reference_id,
                relationship,
                ..
            } => CachedResult::Connections(connections_of(&state.map, reference_id, *relationship).into()),
            QueryKey::Coherence { .. } => {
                CachedResult::Coherence(Arc::new(self.validator.validate_spatial_map(&state.map)))
            }
        }
    }

    // ── Layout ──────────────────────────────────────────────────

    /// One pass of pairwise repulsion for references closer than the
    /// configured layout distance. Repeated calls converge.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn optimize_spatial_layout(&self, map_id: &MapId) -> Result<LayoutReport, SpatialError> {
        self.optimize_spatial_layout_with(map_id, &CancellationToken::new())
    }

    /// [`optimize_spatial_layout`](Self::optimize_spatial_layout), polling
    /// `token` between comparisons. A cancelled pass moves nothing.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`] or [`SpatialError::Cancelled`].
    pub fn optimize_spatial_layout_with(
        &self,
        map_id: &MapId,
        token: &CancellationToken,
    ) -> Result<LayoutReport, SpatialError> {
        let shared = self.state(map_id)?;
        let min_distance = self.config.layout.min_distance;
        self.relocate(map_id, &shared, "optimized layout", |map| {
            repulsion_moves(map, min_distance, &|| token.is_cancelled()).ok_or(SpatialError::Cancelled {
                operation: "layout optimization",
            })
        })
    }

    /// A corrected copy of the map; the live map is untouched.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn suggest_coherence_corrections(&self, map_id: &MapId) -> Result<SpatialMap, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        Ok(self.validator.suggest_coherence_corrections(&state.map))
    }

    /// Commit the corrections [`suggest_coherence_corrections`] proposes,
    /// emitting `REFERENCE_UPDATED` per moved reference.
    ///
    /// [`suggest_coherence_corrections`]: Self::suggest_coherence_corrections
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn apply_coherence_corrections(&self, map_id: &MapId) -> Result<LayoutReport, SpatialError> {
        let shared = self.state(map_id)?;
        self.relocate(map_id, &shared, "applied coherence corrections", |map| {
            Ok(self.validator.correction_moves(map))
        })
    }

    fn relocate(
        &self,
        map_id: &MapId,
        shared: &SharedState,
        what: &'static str,
        plan: impl FnOnce(&SpatialMap) -> Result<Vec<(ReferenceId, SpatialVector)>, SpatialError>,
    ) -> Result<LayoutReport, SpatialError> {
        let report = {
            let mut guard = shared.write()?;
            let state = &mut *guard;
            let moves = plan(&state.map)?;
            let ids = state.map.move_references(moves);
            let mut moved = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(reference) = state.map.reference(id) {
                    state.tracker.update_tracking(id, reference.position);
                    moved.push(reference.clone());
                }
            }
            if !ids.is_empty() {
                self.invalidate(&state.map);
            }
            let report = LayoutReport {
                moved: ids,
                revision: state.map.revision(),
            };
            debug!(map_id = %map_id, moved = report.moved.len(), revision = %report.revision, "{what}");
            shared.outbox.enqueue(
                moved
                    .iter()
                    .map(|r| event(map_id, SpatialEventType::ReferenceUpdated, Some(r.id.clone()), r))
                    .collect(),
            );
            report
        };
        self.deliver(map_id, shared);
        Ok(report)
    }

    // ── Tracker-backed queries ──────────────────────────────────

    /// Live references of one type, in insertion order.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn find_references_by_type(
        &self,
        map_id: &MapId,
        reference_type: ReferenceType,
    ) -> Result<Vec<SpatialReference>, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        Ok(state
            .tracker
            .references_of_type(reference_type)
            .filter_map(|id| state.map.reference(id))
            .cloned()
            .collect())
    }

    /// Record a use of a reference. `Ok(false)` if the id is not live.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn mark_reference_as_used(
        &self,
        map_id: &MapId,
        reference_id: &ReferenceId,
    ) -> Result<bool, SpatialError> {
        let shared = self.state(map_id)?;
        let marked = shared.write()?.tracker.mark_reference_as_used(reference_id);
        Ok(marked)
    }

    /// Up to `limit` most used references, most used first.
    ///
    /// # Errors
    ///
    /// [`SpatialError::MapNotFound`].
    pub fn most_used_references(
        &self,
        map_id: &MapId,
        limit: usize,
    ) -> Result<Vec<SpatialReference>, SpatialError> {
        let shared = self.state(map_id)?;
        let state = shared.read();
        Ok(state
            .tracker
            .most_used(limit)
            .iter()
            .filter_map(|id| state.map.reference(id).cloned())
            .collect())
    }

    // ── Events ──────────────────────────────────────────────────

    /// Call `callback` for every event of `map_id`.
    ///
    /// Never fails: subscribing to an unknown map returns a handle that
    /// receives nothing. A panicking callback is logged and isolated.
    pub fn subscribe_spatial_events(
        &self,
        map_id: &MapId,
        callback: impl Fn(&SpatialEvent) + Send + Sync + 'static,
    ) -> Subscription {
        if !self.maps.read().contains_key(map_id) {
            return Subscription::inert(map_id);
        }
        self.events.subscribe(map_id, Arc::new(callback))
    }

    /// Receive events of `map_id` on a channel with the configured
    /// capacity.
    pub fn spatial_event_channel(&self, map_id: &MapId) -> (Subscription, Receiver<SpatialEvent>) {
        self.spatial_event_channel_with_capacity(map_id, self.config.event_channel_capacity)
    }

    /// Receive events of `map_id` on a channel; `None` = unbounded.
    ///
    /// When a bounded channel is full, new events for this subscriber are
    /// dropped and logged. For an unknown map the receiver is already
    /// disconnected.
    pub fn spatial_event_channel_with_capacity(
        &self,
        map_id: &MapId,
        capacity: Option<usize>,
    ) -> (Subscription, Receiver<SpatialEvent>) {
        let (tx, rx) = match capacity {
            Some(n) => bounded(n.max(1)),
            None => unbounded(),
        };
        if !self.maps.read().contains_key(map_id) {
            return (Subscription::inert(map_id), rx);
        }
        (self.events.subscribe_channel(map_id, tx), rx)
    }

    /// Number of live subscriptions on `map_id`.
    pub fn subscriber_count(&self, map_id: &MapId) -> usize {
        self.events.subscriber_count(map_id)
    }

    // ── Cache maintenance ───────────────────────────────────────

    /// Snapshot of the shared result cache statistics.
    pub fn cache_statistics(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop expired cache entries now; returns how many.
    pub fn validate_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Empty the result cache and reset its statistics.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("cleared result cache");
    }
}

impl std::fmt::Debug for SpatialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialManager")
            .field("maps", &self.maps.read().len())
            .field("cache", &self.cache)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

fn proximity(
    state: &MapState,
    position: SpatialVector,
    radius: f64,
    reference_type: Option<ReferenceType>,
) -> Vec<ProximityMatch> {
    let mut matches: Vec<ProximityMatch> = state
        .tracker
        .candidates_near(position, radius)
        .iter()
        .filter_map(|id| state.map.reference(id))
        .filter(|r| reference_type.is_none_or(|t| r.reference_type == t))
        .filter_map(|r| {
            let distance = calculate_distance(position, r.position);
            (distance <= radius).then(|| ProximityMatch {
                reference: r.clone(),
                distance,
            })
        })
        .collect();
    matches.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.reference.id.cmp(&b.reference.id))
    });
    matches
}

fn connections_of(
    map: &SpatialMap,
    reference_id: &ReferenceId,
    relationship: Option<RelationType>,
) -> Vec<SpatialConnection> {
    map.connections()
        .iter()
        .filter(|c| c.touches(reference_id))
        .filter(|c| relationship.is_none_or(|r| c.relationship == r))
        .cloned()
        .collect()
}
