//! Connections: semantic relationships between two references.
//!
//! Connections refer to their endpoints by [`ReferenceId`] only. The map
//! stores them as an edge list, so deleting a reference cascades by
//! filtering that list rather than following back-pointers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{ConnectionId, ReferenceId};
use crate::reference::clamp_unit;

/// The kind of relationship a connection expresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Physical arrangement (next to, on top of).
    Spatial,
    /// Meaning-level association.
    Semantic,
    /// Ordering in time.
    Temporal,
    /// One referent brings about the other.
    Causal,
    /// Part/whole or member/group.
    Hierarchical,
    /// Ownership.
    Possession,
    /// Agent acting on a patient (directional verbs).
    Agency,
}

/// A directed or bidirectional edge between two references of one map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialConnection {
    /// Identity within the owning map.
    pub id: ConnectionId,
    /// Origin reference.
    pub source_id: ReferenceId,
    /// Destination reference.
    pub target_id: ReferenceId,
    /// Relationship kind.
    pub relationship: RelationType,
    /// Strength in `[0, 1]`.
    pub strength: f64,
    /// Whether the relation holds in both directions.
    pub bidirectional: bool,
    /// Free-form annotations.
    pub properties: Map<String, Value>,
}

impl SpatialConnection {
    /// Whether `reference` is the source or the target.
    pub fn touches(&self, reference: &ReferenceId) -> bool {
        &self.source_id == reference || &self.target_id == reference
    }
}

/// Optional attributes for a new connection.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionOptions {
    /// Strength, clamped to `[0, 1]`. Default: 1.0.
    pub strength: f64,
    /// Default: false.
    pub bidirectional: bool,
    /// Free-form annotations.
    pub properties: Map<String, Value>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            strength: 1.0,
            bidirectional: false,
            properties: Map::new(),
        }
    }
}

impl ConnectionOptions {
    /// Options with the given strength.
    pub fn with_strength(strength: f64) -> Self {
        Self {
            strength,
            ..Self::default()
        }
    }

    /// Mark the connection bidirectional.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Build the connection between `source` and `target`.
    pub fn into_connection(
        self,
        source_id: ReferenceId,
        target_id: ReferenceId,
        relationship: RelationType,
    ) -> SpatialConnection {
        SpatialConnection {
            id: ConnectionId::generate(),
            source_id,
            target_id,
            relationship,
            strength: clamp_unit(self.strength),
            bidirectional: self.bidirectional,
            properties: self.properties,
        }
    }
}
