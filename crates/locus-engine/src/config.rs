//! Manager configuration, validation and error types.
//!
//! [`ManagerConfig`] gathers the cache levels, validator thresholds,
//! tracker and layout parameters. [`validate()`](ManagerConfig::validate)
//! runs once when the [`SpatialManager`](crate::SpatialManager) is built.

use locus_cache::{CacheConfig, CacheConfigError};
use locus_coherence::{CoherenceConfig, CoherenceConfigError};
use thiserror::Error;

// ── TrackerConfig ──────────────────────────────────────────────────

/// Spatial index parameters for [`ReferenceTracker`](crate::ReferenceTracker).
#[derive(Clone, Debug, PartialEq)]
pub struct TrackerConfig {
    /// Edge length of the cubic grid buckets. Default: 1.0.
    pub bucket_size: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { bucket_size: 1.0 }
    }
}

// ── LayoutConfig ───────────────────────────────────────────────────

/// Parameters of the layout optimisation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Pairs closer than this are pushed apart. Default: 0.3.
    pub min_distance: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { min_distance: 0.3 }
    }
}

// ── CacheRouting ───────────────────────────────────────────────────

/// Which cache level each kind of derived result is stored in.
///
/// Predicted results go to whichever level declares a preload strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRouting {
    /// Proximity search results. Default: `hot`.
    pub proximity: String,
    /// Connection lookups. Default: `hot`.
    pub connections: String,
    /// Coherence reports. Default: `warm`.
    pub coherence: String,
}

impl Default for CacheRouting {
    fn default() -> Self {
        Self {
            proximity: "hot".into(),
            connections: "hot".into(),
            coherence: "warm".into(),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`ManagerConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Cache levels are malformed.
    #[error(transparent)]
    Cache(#[from] CacheConfigError),
    /// Validator thresholds are out of range.
    #[error(transparent)]
    Coherence(#[from] CoherenceConfigError),
    /// Tracker bucket size is NaN, infinite, zero or negative.
    #[error("tracker bucket_size must be positive and finite, got {value}")]
    InvalidBucketSize {
        /// The invalid value.
        value: f64,
    },
    /// Layout minimum distance is NaN, infinite, zero or negative.
    #[error("layout min_distance must be positive and finite, got {value}")]
    InvalidLayoutDistance {
        /// The invalid value.
        value: f64,
    },
    /// A routing entry names a level the cache does not declare.
    #[error("{purpose} results are routed to undeclared cache level '{level}'")]
    UnknownCacheLevel {
        /// Which kind of result is routed.
        purpose: &'static str,
        /// The missing level.
        level: String,
    },
    /// Bounded event channels need room for at least one event.
    #[error("event_channel_capacity must be at least 1 when bounded")]
    ZeroChannelCapacity,
}

// ── ManagerConfig ──────────────────────────────────────────────────

/// Complete configuration of a [`SpatialManager`](crate::SpatialManager).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ManagerConfig {
    /// Shared result cache.
    pub cache: CacheConfig,
    /// Validator thresholds.
    pub coherence: CoherenceConfig,
    /// Per-map spatial index.
    pub tracker: TrackerConfig,
    /// Layout optimisation.
    pub layout: LayoutConfig,
    /// Cache level per result kind.
    pub routing: CacheRouting,
    /// Capacity of channels from
    /// [`spatial_event_channel`](crate::SpatialManager::spatial_event_channel).
    /// `None` = unbounded. Default: `Some(1024)`.
    pub event_channel_capacity: Option<usize>,
}

impl ManagerConfig {
    /// Default bounded channel capacity.
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

    /// Default configuration with the standard channel capacity.
    pub fn new() -> Self {
        Self {
            event_channel_capacity: Some(Self::DEFAULT_EVENT_CHANNEL_CAPACITY),
            ..Self::default()
        }
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// The first violated invariant, as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.coherence.validate()?;
        let bucket = self.tracker.bucket_size;
        if !(bucket.is_finite() && bucket > 0.0) {
            return Err(ConfigError::InvalidBucketSize { value: bucket });
        }
        let layout = self.layout.min_distance;
        if !(layout.is_finite() && layout > 0.0) {
            return Err(ConfigError::InvalidLayoutDistance { value: layout });
        }
        for (purpose, level) in [
            ("proximity", &self.routing.proximity),
            ("connection", &self.routing.connections),
            ("coherence", &self.routing.coherence),
        ] {
            if !self.cache.has_level(level) {
                return Err(ConfigError::UnknownCacheLevel {
                    purpose,
                    level: level.clone(),
                });
            }
        }
        if self.event_channel_capacity == Some(0) {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }
}
