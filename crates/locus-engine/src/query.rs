//! Cache keys and values for derived query results.
//!
//! Every key carries the map [`Revision`] it was computed against, so a
//! result can never be served after the map has changed.

use std::sync::Arc;

use locus_core::{
    CoherenceReport, MapId, ReferenceId, ReferenceType, RelationType, Revision, SpatialConnection,
    SpatialVector,
};

use crate::manager::ProximityMatch;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum QueryKey {
    Proximity {
        map_id: MapId,
        revision: Revision,
        position: [u64; 3],
        radius: u64,
        reference_type: Option<ReferenceType>,
    },
    Connections {
        map_id: MapId,
        revision: Revision,
        reference_id: ReferenceId,
        relationship: Option<RelationType>,
    },
    Coherence {
        map_id: MapId,
        revision: Revision,
    },
}

impl QueryKey {
    pub(crate) fn proximity(
        map_id: &MapId,
        revision: Revision,
        position: SpatialVector,
        radius: f64,
        reference_type: Option<ReferenceType>,
    ) -> Self {
        Self::Proximity {
            map_id: map_id.clone(),
            revision,
            position: position.to_bits(),
            radius: radius.to_bits(),
            reference_type,
        }
    }

    pub(crate) fn map_id(&self) -> &MapId {
        match self {
            Self::Proximity { map_id, .. }
            | Self::Connections { map_id, .. }
            | Self::Coherence { map_id, .. } => map_id,
        }
    }

    pub(crate) fn revision(&self) -> Revision {
        match self {
            Self::Proximity { revision, .. }
            | Self::Connections { revision, .. }
            | Self::Coherence { revision, .. } => *revision,
        }
    }

    /// The same query against another revision.
    pub(crate) fn at_revision(&self, revision: Revision) -> Self {
        let mut key = self.clone();
        match &mut key {
            Self::Proximity { revision: r, .. }
            | Self::Connections { revision: r, .. }
            | Self::Coherence { revision: r, .. } => *r = revision,
        }
        key
    }

    /// Revision-free form used for access-pattern learning.
    pub(crate) fn pattern(&self) -> Self {
        self.at_revision(Revision(0))
    }
}

#[derive(Clone, Debug)]
pub(crate) enum CachedResult {
    Proximity(Arc<[ProximityMatch]>),
    Connections(Arc<[SpatialConnection]>),
    Coherence(Arc<CoherenceReport>),
}
