//! Spatial map orchestration for Locus.
//!
//! [`SpatialManager`] is the entry point for callers. It owns every live
//! [`SpatialMap`](locus_core::SpatialMap), keeps a [`ReferenceTracker`] per
//! map, delegates geometry checks to the
//! [`CoherenceValidator`](locus_coherence::CoherenceValidator), caches
//! derived query results in a shared
//! [`MultiLevelCache`](locus_cache::MultiLevelCache) and publishes change
//! events to per-map subscribers.
//!
//! # Concurrency
//!
//! Each map sits behind its own read/write lock: mutations of one map are
//! serialised, reads run concurrently and always observe a committed
//! snapshot. Maps are independent; there are no cross-map operations.
//! Subscribers are notified after the map lock is released.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod events;
pub(crate) mod layout;
pub mod manager;
pub(crate) mod query;
pub mod tracker;

pub use config::{CacheRouting, ConfigError, LayoutConfig, ManagerConfig, TrackerConfig};
pub use events::{EventCallback, Subscription};
pub use manager::{LayoutReport, ProximityMatch, SpatialManager};
pub use tracker::{BucketKey, ReferenceTracker, UsageStats};
