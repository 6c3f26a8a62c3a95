//! Change events published to a map's subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{MapId, ReferenceId, Timestamp};

/// What changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpatialEventType {
    /// A reference was added.
    ReferenceAdded,
    /// A reference's attributes changed.
    ReferenceUpdated,
    /// A reference was removed.
    ReferenceRemoved,
    /// A connection was created.
    RelationshipCreated,
    /// A connection was removed, explicitly or by cascade.
    RelationshipRemoved,
}

/// A change notification.
///
/// `data` carries the affected entity serialized as JSON, so a
/// network-facing wrapper can forward events unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialEvent {
    /// What changed.
    #[serde(rename = "type")]
    pub event_type: SpatialEventType,
    /// The map the change happened in.
    pub map_id: MapId,
    /// The reference concerned (the source endpoint for relationship events).
    pub reference_id: Option<ReferenceId>,
    /// When the change was committed.
    pub timestamp: Timestamp,
    /// Event payload.
    pub data: Value,
}

impl SpatialEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        event_type: SpatialEventType,
        map_id: MapId,
        reference_id: Option<ReferenceId>,
        data: Value,
    ) -> Self {
        Self {
            event_type,
            map_id,
            reference_id,
            timestamp: Timestamp::now(),
            data,
        }
    }
}
