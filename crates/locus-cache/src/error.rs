//! Cache error types.

use thiserror::Error;

/// Malformed level configuration, reported at construction time only.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CacheConfigError {
    /// The configuration declares no levels.
    #[error("cache configuration declares no levels")]
    NoLevels,
    /// A level has `max_size == 0`; eviction needs at least one slot.
    #[error("cache level '{level}' has zero capacity")]
    ZeroCapacity {
        /// The offending level.
        level: String,
    },
    /// Two levels share a name.
    #[error("cache level '{level}' is declared more than once")]
    DuplicateLevel {
        /// The repeated name.
        level: String,
    },
    /// A level's TTL is zero, so nothing it stores could ever be read.
    #[error("cache level '{level}' has a zero ttl")]
    ZeroTtl {
        /// The offending level.
        level: String,
    },
    /// Adaptive weights are negative, non-finite or all zero.
    #[error("cache level '{level}' has invalid adaptive weights: {reason}")]
    InvalidAdaptiveWeights {
        /// The offending level.
        level: String,
        /// What is wrong with the weights.
        reason: String,
    },
    /// A pattern preload strategy has `min_occurrences == 0`.
    #[error("cache level '{level}' has an invalid preload strategy: {reason}")]
    InvalidPreload {
        /// The offending level.
        level: String,
        /// What is wrong with the strategy.
        reason: String,
    },
}

/// Runtime cache errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CacheError {
    /// `set` named a level the cache was not configured with.
    #[error("unknown cache level '{level}'")]
    UnknownLevel {
        /// The requested name.
        level: String,
    },
}
