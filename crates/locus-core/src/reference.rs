//! Spatial references: the entities placed in signing space.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{ReferenceId, Timestamp};
use crate::vector::SpatialVector;

/// What kind of entity a reference stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// A person or animate agent.
    Person,
    /// A concrete object.
    Object,
    /// A place.
    Location,
    /// An abstract idea.
    Concept,
    /// An event or action anchored in space.
    Event,
    /// A point on a spatialised timeline.
    Temporal,
    /// A collective of persons or objects.
    Group,
}

impl ReferenceType {
    /// Every variant, in declaration order.
    pub const ALL: [ReferenceType; 7] = [
        Self::Person,
        Self::Object,
        Self::Location,
        Self::Concept,
        Self::Event,
        Self::Temporal,
        Self::Group,
    ];
}

/// Whether a reference is currently in play in the discourse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationState {
    /// Referred to in the current stretch of discourse.
    #[default]
    Active,
    /// Established but not currently referred to.
    Inactive,
    /// Introduced but not yet anchored by the signer.
    Pending,
    /// Retired; kept only for history.
    Archived,
}

/// Bounding box dimensions of a reference.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialSize {
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
    /// Extent along z.
    pub depth: f64,
}

impl SpatialSize {
    /// Construct a bounding box.
    pub const fn new(width: f64, height: f64, depth: f64) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// A cube with the given edge length.
    pub const fn cube(edge: f64) -> Self {
        Self::new(edge, edge, edge)
    }

    /// Mean half-extent: the sum of the three dimensions divided by six.
    pub fn mean_radius(&self) -> f64 {
        (self.width + self.height + self.depth) / 6.0
    }
}

/// A spatially positioned entity in a [`SpatialMap`](crate::SpatialMap).
///
/// Only the manager creates and mutates references; callers receive
/// clones. `id` is immutable and `updated_at >= created_at` always holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialReference {
    /// Identity within the owning map.
    pub id: ReferenceId,
    /// Kind of entity.
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    /// Anchor point in signing space.
    pub position: SpatialVector,
    /// Optional facing, as Euler angles in radians.
    pub orientation: Option<SpatialVector>,
    /// Optional bounding box; validators fall back to a default box.
    pub size: Option<SpatialSize>,
    /// Discourse salience in `[0, 1]`.
    pub importance: f64,
    /// Discourse state.
    pub activation_state: ActivationState,
    /// How firmly the locus is established, in `[0, 1]`.
    pub persistence_score: f64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Free-form annotations.
    pub properties: Map<String, Value>,
}

impl SpatialReference {
    /// Whether the reference is [`ActivationState::Active`].
    pub fn is_active(&self) -> bool {
        self.activation_state == ActivationState::Active
    }
}

/// Caller input for creating a reference.
///
/// Everything except type and position has a default: a generated id,
/// importance 0.5, active state and full persistence.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceDraft {
    /// Caller-chosen id; generated when `None`.
    pub id: Option<ReferenceId>,
    /// Kind of entity.
    pub reference_type: ReferenceType,
    /// Anchor point.
    pub position: SpatialVector,
    /// Optional facing.
    pub orientation: Option<SpatialVector>,
    /// Optional bounding box.
    pub size: Option<SpatialSize>,
    /// Salience, clamped to `[0, 1]`.
    pub importance: f64,
    /// Initial discourse state.
    pub activation_state: ActivationState,
    /// Initial persistence, clamped to `[0, 1]`.
    pub persistence_score: f64,
    /// Free-form annotations.
    pub properties: Map<String, Value>,
}

impl ReferenceDraft {
    /// A draft with default attributes at `position`.
    pub fn new(reference_type: ReferenceType, position: SpatialVector) -> Self {
        Self {
            id: None,
            reference_type,
            position,
            orientation: None,
            size: None,
            importance: 0.5,
            activation_state: ActivationState::Active,
            persistence_score: 1.0,
            properties: Map::new(),
        }
    }

    /// Use a caller-chosen id.
    pub fn with_id(mut self, id: impl Into<ReferenceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the bounding box.
    pub fn with_size(mut self, size: SpatialSize) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the facing.
    pub fn with_orientation(mut self, orientation: SpatialVector) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Set the salience.
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    /// Set the discourse state.
    pub fn with_activation_state(mut self, state: ActivationState) -> Self {
        self.activation_state = state;
        self
    }

    /// Add a free-form property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Materialise the draft at time `now`, generating an id if needed.
    pub fn into_reference(self, now: Timestamp) -> SpatialReference {
        SpatialReference {
            id: self.id.unwrap_or_else(ReferenceId::generate),
            reference_type: self.reference_type,
            position: self.position,
            orientation: self.orientation,
            size: self.size,
            importance: clamp_unit(self.importance),
            activation_state: self.activation_state,
            persistence_score: clamp_unit(self.persistence_score),
            created_at: now,
            updated_at: now,
            properties: self.properties,
        }
    }
}

/// Partial update of a reference. `None` leaves the attribute unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferencePatch {
    /// New kind.
    pub reference_type: Option<ReferenceType>,
    /// New anchor point.
    pub position: Option<SpatialVector>,
    /// New facing (`Some(None)` clears it).
    pub orientation: Option<Option<SpatialVector>>,
    /// New bounding box (`Some(None)` clears it).
    pub size: Option<Option<SpatialSize>>,
    /// New salience.
    pub importance: Option<f64>,
    /// New discourse state.
    pub activation_state: Option<ActivationState>,
    /// New persistence.
    pub persistence_score: Option<f64>,
    /// Properties merged over the existing ones; `Value::Null` removes a key.
    pub properties: Option<Map<String, Value>>,
}

impl ReferencePatch {
    /// A patch that only moves the reference.
    pub fn position(position: SpatialVector) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// A patch that only changes the discourse state.
    pub fn activation_state(state: ActivationState) -> Self {
        Self {
            activation_state: Some(state),
            ..Self::default()
        }
    }

    /// Apply onto `reference`, stamping `updated_at` with `now`.
    ///
    /// `id` and `created_at` are never touched.
    pub fn apply(self, reference: &mut SpatialReference, now: Timestamp) {
        if let Some(t) = self.reference_type {
            reference.reference_type = t;
        }
        if let Some(p) = self.position {
            reference.position = p;
        }
        if let Some(o) = self.orientation {
            reference.orientation = o;
        }
        if let Some(s) = self.size {
            reference.size = s;
        }
        if let Some(i) = self.importance {
            reference.importance = clamp_unit(i);
        }
        if let Some(a) = self.activation_state {
            reference.activation_state = a;
        }
        if let Some(p) = self.persistence_score {
            reference.persistence_score = clamp_unit(p);
        }
        if let Some(props) = self.properties {
            for (key, value) in props {
                if value.is_null() {
                    reference.properties.remove(&key);
                } else {
                    reference.properties.insert(key, value);
                }
            }
        }
        reference.updated_at = now.max(reference.created_at);
    }
}

/// Clamp into `[0, 1]`, mapping NaN to zero.
pub(crate) fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ReferenceDraft {
        ReferenceDraft::new(ReferenceType::Person, SpatialVector::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn draft_defaults() {
        let r = draft().into_reference(Timestamp(10));
        assert!(r.id.as_str().starts_with("ref-"));
        assert_eq!(r.importance, 0.5);
        assert_eq!(r.persistence_score, 1.0);
        assert!(r.is_active());
        assert_eq!(r.created_at, r.updated_at);
    }

    #[test]
    fn draft_clamps_scores() {
        let r = draft()
            .with_importance(4.0)
            .with_id("mother")
            .into_reference(Timestamp(0));
        assert_eq!(r.importance, 1.0);
        assert_eq!(r.id, ReferenceId::new("mother"));

        let nan = draft().with_importance(f64::NAN).into_reference(Timestamp(0));
        assert_eq!(nan.importance, 0.0);
    }

    #[test]
    fn mean_radius_is_sum_over_six() {
        assert!((SpatialSize::cube(0.3).mean_radius() - 0.15).abs() < 1e-12);
        assert!((SpatialSize::new(1.0, 2.0, 3.0).mean_radius() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn patch_keeps_identity_and_created_at() {
        let mut r = draft().with_id("a").into_reference(Timestamp(100));
        ReferencePatch {
            position: Some(SpatialVector::new(5.0, 5.0, 5.0)),
            importance: Some(-1.0),
            ..Default::default()
        }
        .apply(&mut r, Timestamp(50));

        assert_eq!(r.id, ReferenceId::new("a"));
        assert_eq!(r.created_at, Timestamp(100));
        // A clock that stepped back never makes updated_at < created_at.
        assert_eq!(r.updated_at, Timestamp(100));
        assert_eq!(r.position, SpatialVector::new(5.0, 5.0, 5.0));
        assert_eq!(r.importance, 0.0);
    }

    #[test]
    fn patch_properties_merge_and_null_removes() {
        let mut r = draft()
            .with_property("gloss", "MOTHER")
            .with_property("hand", "dominant")
            .into_reference(Timestamp(0));
        let mut props = Map::new();
        props.insert("gloss".into(), Value::Null);
        props.insert("colour".into(), Value::from("red"));
        ReferencePatch {
            properties: Some(props),
            ..Default::default()
        }
        .apply(&mut r, Timestamp(1));

        assert!(!r.properties.contains_key("gloss"));
        assert_eq!(r.properties["hand"], "dominant");
        assert_eq!(r.properties["colour"], "red");
    }

    #[test]
    fn serializes_type_in_screaming_case() {
        let r = draft().with_id("x").into_reference(Timestamp(0));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "PERSON");
        assert_eq!(json["activation_state"], "ACTIVE");
    }
}
