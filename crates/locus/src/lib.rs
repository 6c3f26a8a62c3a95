//! Locus: spatial reference management for sign language processing.
//!
//! Signers place entities at points in the space around their body and
//! refer back to them by pointing or by directing verbs between them. Locus
//! keeps those placements as per-session spatial maps, answers proximity
//! and connection queries through a multi-level cache, and checks that a
//! layout stays legible.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Locus sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use locus::prelude::*;
//!
//! let manager = SpatialManager::new(ManagerConfig::new()).unwrap();
//! let map = manager.create_spatial_map("family", "session-1", ComplexityLevel::Basic);
//! let map_id = map.id().clone();
//!
//! let mother = manager
//!     .add_reference(
//!         &map_id,
//!         ReferenceDraft::new(ReferenceType::Person, SpatialVector::new(-1.0, 0.0, 0.5))
//!             .with_id("mother"),
//!     )
//!     .unwrap();
//! let child = manager
//!     .add_reference(
//!         &map_id,
//!         ReferenceDraft::new(ReferenceType::Person, SpatialVector::new(1.0, 0.0, 0.5))
//!             .with_id("child"),
//!     )
//!     .unwrap();
//! manager
//!     .connect_references(
//!         &map_id,
//!         &mother.id,
//!         &child.id,
//!         RelationType::Agency,
//!         ConnectionOptions::default(),
//!     )
//!     .unwrap();
//!
//! let near = manager
//!     .find_references_near_position(&map_id, SpatialVector::new(-1.0, 0.0, 0.0), 1.0, None)
//!     .unwrap();
//! assert_eq!(near[0].reference.id, mother.id);
//!
//! let report = manager.validate_spatial_coherence(&map_id).unwrap();
//! assert!(report.is_coherent);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `locus-core` | IDs, references, connections, maps, events, errors |
//! | [`cache`] | `locus-cache` | Multi-level cache with eviction policies and preloading |
//! | [`coherence`] | `locus-coherence` | Geometric validation and corrections |
//! | [`engine`] | `locus-engine` | The `SpatialManager`, tracker and subscriptions |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Data model shared by every crate (`locus-core`).
///
/// Maps, references, connections, regions, change events and the
/// [`types::SpatialError`] taxonomy.
pub use locus_core as types;

/// Generic multi-level cache (`locus-cache`).
///
/// Usable on its own; the manager instantiates one
/// [`cache::MultiLevelCache`] for derived query results.
pub use locus_cache as cache;

/// Geometric coherence validation (`locus-coherence`).
pub use locus_coherence as coherence;

/// Map orchestration (`locus-engine`).
///
/// [`engine::SpatialManager`] is the entry point.
pub use locus_engine as engine;

/// Common imports for typical Locus usage.
///
/// ```rust
/// use locus::prelude::*;
/// ```
pub mod prelude {
    // Data model
    pub use locus_core::{
        ActivationState, ComplexityLevel, ConnectionOptions, MapId, ReferenceDraft, ReferenceId,
        ReferencePatch, ReferenceType, RegionDraft, RelationType, SpatialConnection, SpatialMap,
        SpatialReference, SpatialVector,
    };

    // Events and reports
    pub use locus_core::{CoherenceReport, SpatialEvent, SpatialEventType};

    // Errors and cancellation
    pub use locus_core::{CancellationToken, SpatialError};

    // Cache
    pub use locus_cache::{CacheConfig, CacheStats, EvictionPolicy, LevelConfig};

    // Validation
    pub use locus_coherence::{CoherenceConfig, CoherenceValidator};

    // Engine
    pub use locus_engine::{
        ConfigError, LayoutReport, ManagerConfig, ProximityMatch, SpatialManager, Subscription,
    };
}
