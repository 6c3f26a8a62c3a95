//! Multi-level keyed cache for Locus.
//!
//! [`MultiLevelCache`] holds values in named levels (for example `hot`,
//! `warm` and `predictive`), each with its own capacity, [`EvictionPolicy`]
//! and time-to-live. Lookups scan levels in declaration order; inserts
//! target one named level and evict within it when full.
//!
//! Levels are declared once through [`CacheConfig`] and validated at
//! construction. The cache is internally synchronised and meant to be
//! shared behind an `Arc`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub(crate) mod entry;
pub mod error;
pub mod policy;
pub(crate) mod predict;
pub mod stats;

pub use cache::MultiLevelCache;
pub use config::{CacheConfig, CacheConfigBuilder, LevelConfig, PreloadStrategy};
pub use error::{CacheConfigError, CacheError};
pub use policy::{AdaptiveWeights, EvictionPolicy};
pub use stats::{CacheStats, LevelStats};
