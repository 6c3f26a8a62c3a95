//! Core types for the Locus spatial reference framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! data model shared by every other Locus crate: identifiers, vectors,
//! references, connections, regions, the [`SpatialMap`] aggregate, change
//! events, coherence report types and the [`SpatialError`] taxonomy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod coherence;
pub mod connection;
pub mod error;
pub mod event;
pub mod id;
pub mod map;
pub mod reference;
pub mod region;
pub mod vector;

pub use cancel::CancellationToken;
pub use coherence::{CoherenceIssue, CoherenceReport, IssueKind, IssueSeverity};
pub use connection::{ConnectionOptions, RelationType, SpatialConnection};
pub use error::SpatialError;
pub use event::{SpatialEvent, SpatialEventType};
pub use id::{ConnectionId, MapId, ReferenceId, RegionId, Revision, Timestamp};
pub use map::{ComplexityLevel, MapContext, MapMetadata, MapStatistics, RemovedReference, SpatialMap};
pub use reference::{
    ActivationState, ReferenceDraft, ReferencePatch, ReferenceType, SpatialReference, SpatialSize,
};
pub use region::{RegionDraft, RegionExtent, SpatialRegion};
pub use vector::SpatialVector;
