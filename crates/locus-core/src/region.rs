//! Named spatial areas grouping references.

use serde::{Deserialize, Serialize};

use crate::id::{ReferenceId, RegionId};
use crate::reference::SpatialSize;
use crate::vector::SpatialVector;

/// Shape of a region around its centre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionExtent {
    /// A sphere of the given radius.
    Radius(f64),
    /// An axis-aligned box centred on the region position.
    Dimensions(SpatialSize),
}

/// A named area of signing space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialRegion {
    /// Identity within the owning map.
    pub id: RegionId,
    /// Display name.
    pub name: String,
    /// Centre.
    pub position: SpatialVector,
    /// Shape.
    pub extent: RegionExtent,
    /// Whether the region is in use.
    pub is_active: bool,
    /// Member references.
    pub reference_ids: Vec<ReferenceId>,
    /// Optional weight of the region in discourse.
    pub semantic_weight: Option<f64>,
}

impl SpatialRegion {
    /// Whether `point` lies inside the region (boundary inclusive).
    pub fn contains(&self, point: SpatialVector) -> bool {
        let d = point - self.position;
        match self.extent {
            RegionExtent::Radius(r) => d.length() <= r,
            RegionExtent::Dimensions(size) => {
                d.x.abs() <= size.width / 2.0
                    && d.y.abs() <= size.height / 2.0
                    && d.z.abs() <= size.depth / 2.0
            }
        }
    }
}

/// Caller input for creating a region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionDraft {
    /// Display name.
    pub name: String,
    /// Centre.
    pub position: SpatialVector,
    /// Shape.
    pub extent: RegionExtent,
    /// Default: true.
    pub is_active: bool,
    /// Initial members.
    pub reference_ids: Vec<ReferenceId>,
    /// Optional weight.
    pub semantic_weight: Option<f64>,
}

impl RegionDraft {
    /// An active spherical region with no members.
    pub fn sphere(name: impl Into<String>, position: SpatialVector, radius: f64) -> Self {
        Self {
            name: name.into(),
            position,
            extent: RegionExtent::Radius(radius),
            is_active: true,
            reference_ids: Vec::new(),
            semantic_weight: None,
        }
    }

    /// Add a member.
    pub fn with_member(mut self, id: impl Into<ReferenceId>) -> Self {
        self.reference_ids.push(id.into());
        self
    }

    /// Materialise the draft with a generated id.
    pub fn into_region(self) -> SpatialRegion {
        SpatialRegion {
            id: RegionId::generate(),
            name: self.name,
            position: self.position,
            extent: self.extent,
            is_active: self.is_active,
            reference_ids: self.reference_ids,
            semantic_weight: self.semantic_weight,
        }
    }
}
