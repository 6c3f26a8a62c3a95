//! Cache level configuration.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::CacheConfigError;
use crate::policy::EvictionPolicy;

/// How a level is populated ahead of demand.
#[derive(Clone, Debug, PartialEq)]
pub enum PreloadStrategy {
    /// Record which key tends to be requested after which, and predict
    /// successors seen at least `min_occurrences` times.
    Pattern {
        /// Observations needed before a successor is predicted. Default: 2.
        min_occurrences: u32,
        /// Most predictions returned per key. Default: 4.
        max_predictions: usize,
    },
}

impl Default for PreloadStrategy {
    fn default() -> Self {
        Self::Pattern {
            min_occurrences: 2,
            max_predictions: 4,
        }
    }
}

/// One named cache level.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelConfig {
    /// Level name, unique within a cache.
    pub name: String,
    /// Maximum number of entries. Must be at least 1.
    pub max_size: usize,
    /// Victim selection when the level is full.
    pub eviction_policy: EvictionPolicy,
    /// Age after which an entry reads as a miss. `None` = never expires.
    pub ttl: Option<Duration>,
    /// Optional predictive population.
    pub preload: Option<PreloadStrategy>,
}

impl LevelConfig {
    /// A level without TTL or preloading.
    pub fn new(name: impl Into<String>, max_size: usize, eviction_policy: EvictionPolicy) -> Self {
        Self {
            name: name.into(),
            max_size,
            eviction_policy,
            ttl: None,
            preload: None,
        }
    }

    /// Set the time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Enable predictive preloading into this level.
    pub fn with_preload(mut self, strategy: PreloadStrategy) -> Self {
        self.preload = Some(strategy);
        self
    }

    fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_size == 0 {
            return Err(CacheConfigError::ZeroCapacity {
                level: self.name.clone(),
            });
        }
        if self.ttl == Some(Duration::ZERO) {
            return Err(CacheConfigError::ZeroTtl {
                level: self.name.clone(),
            });
        }
        if let EvictionPolicy::Adaptive(weights) = &self.eviction_policy {
            weights
                .validate()
                .map_err(|reason| CacheConfigError::InvalidAdaptiveWeights {
                    level: self.name.clone(),
                    reason,
                })?;
        }
        if let Some(PreloadStrategy::Pattern {
            min_occurrences,
            max_predictions,
        }) = &self.preload
        {
            if *min_occurrences == 0 || *max_predictions == 0 {
                return Err(CacheConfigError::InvalidPreload {
                    level: self.name.clone(),
                    reason: "min_occurrences and max_predictions must be at least 1".into(),
                });
            }
        }
        Ok(())
    }
}

/// Complete cache configuration: levels in lookup priority order.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Levels, fastest first.
    pub levels: Vec<LevelConfig>,
    /// Source keys remembered by the pattern predictor. Default: 1024.
    pub max_tracked_patterns: usize,
}

impl CacheConfig {
    /// Default transition-table bound for the pattern predictor.
    pub const DEFAULT_MAX_TRACKED_PATTERNS: usize = 1024;

    /// Start building a configuration.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder {
            levels: Vec::new(),
            max_tracked_patterns: Self::DEFAULT_MAX_TRACKED_PATTERNS,
        }
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// The first [`CacheConfigError`] found, in level order.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.levels.is_empty() {
            return Err(CacheConfigError::NoLevels);
        }
        let mut seen = HashSet::new();
        for level in &self.levels {
            if !seen.insert(level.name.as_str()) {
                return Err(CacheConfigError::DuplicateLevel {
                    level: level.name.clone(),
                });
            }
            level.validate()?;
        }
        Ok(())
    }

    /// Whether a level with this name is declared.
    pub fn has_level(&self, name: &str) -> bool {
        self.levels.iter().any(|l| l.name == name)
    }
}

impl Default for CacheConfig {
    /// `hot` (128, LRU, 30 s), `warm` (1024, LFU, 300 s) and
    /// `predictive` (256, adaptive, 60 s, pattern preload).
    fn default() -> Self {
        Self {
            levels: vec![
                LevelConfig::new("hot", 128, EvictionPolicy::Lru).with_ttl(Duration::from_secs(30)),
                LevelConfig::new("warm", 1024, EvictionPolicy::Lfu)
                    .with_ttl(Duration::from_secs(300)),
                LevelConfig::new("predictive", 256, EvictionPolicy::adaptive())
                    .with_ttl(Duration::from_secs(60))
                    .with_preload(PreloadStrategy::default()),
            ],
            max_tracked_patterns: Self::DEFAULT_MAX_TRACKED_PATTERNS,
        }
    }
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    levels: Vec<LevelConfig>,
    max_tracked_patterns: usize,
}

impl CacheConfigBuilder {
    /// Append a level (lower priority than those already added).
    pub fn level(mut self, level: LevelConfig) -> Self {
        self.levels.push(level);
        self
    }

    /// Bound the pattern predictor's transition table.
    pub fn max_tracked_patterns(mut self, n: usize) -> Self {
        self.max_tracked_patterns = n;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`CacheConfig::validate`].
    pub fn build(self) -> Result<CacheConfig, CacheConfigError> {
        let config = CacheConfig {
            levels: self.levels,
            max_tracked_patterns: self.max_tracked_patterns,
        };
        config.validate()?;
        Ok(config)
    }
}
