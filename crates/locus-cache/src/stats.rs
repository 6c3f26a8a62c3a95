//! Read-only cache statistics.

use std::time::Duration;

/// Counters of one level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelStats {
    /// Level name.
    pub name: String,
    /// Eviction policy name.
    pub policy: &'static str,
    /// Live entries (expired entries not yet purged included).
    pub len: usize,
    /// Configured maximum.
    pub capacity: usize,
    /// Lookups answered by this level.
    pub hits: u64,
    /// Entries discarded to make room.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

/// Aggregate statistics, reset only by [`MultiLevelCache::clear`](crate::MultiLevelCache::clear).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheStats {
    /// Lookups answered by any level.
    pub hits: u64,
    /// Lookups no level could answer.
    pub misses: u64,
    /// Mean wall time spent inside `get`.
    pub average_access_latency: Duration,
    /// Per-level counters, in lookup order.
    pub levels: Vec<LevelStats>,
    /// Entries stored by the predictor.
    pub preloads: u64,
    /// Preloaded entries that were later read.
    pub preload_hits: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Fraction of preloads that were used, or `None` before any preload.
    pub fn preload_effectiveness(&self) -> Option<f64> {
        if self.preloads == 0 {
            return None;
        }
        Some(self.preload_hits as f64 / self.preloads as f64)
    }

    /// Evictions summed over every level.
    pub fn total_evictions(&self) -> u64 {
        self.levels.iter().map(|l| l.evictions).sum()
    }

    /// Counters of the named level.
    pub fn level(&self, name: &str) -> Option<&LevelStats> {
        self.levels.iter().find(|l| l.name == name)
    }
}
