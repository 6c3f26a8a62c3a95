//! Eviction policies.
//!
//! Each [`EvictionPolicy`] variant is one total order over a level's
//! entries; the victim is the minimum. Every order ends with the
//! insertion sequence, so ties always go to the oldest insertion.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::entry::CacheEntry;

/// Weights for [`EvictionPolicy::Adaptive`] scoring.
///
/// Each component scores an entry in `[0, 1]` (higher is more worth
/// keeping); the weighted sum picks the victim.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdaptiveWeights {
    /// Weight of recent access.
    pub recency: f64,
    /// Weight of access count.
    pub frequency: f64,
    /// Weight of remaining time-to-live.
    pub ttl: f64,
}

impl Default for AdaptiveWeights {
    fn default() -> Self {
        Self {
            recency: 1.0 / 3.0,
            frequency: 1.0 / 3.0,
            ttl: 1.0 / 3.0,
        }
    }
}

impl AdaptiveWeights {
    pub(crate) fn validate(&self) -> Result<(), String> {
        let all = [self.recency, self.frequency, self.ttl];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(format!("weights must be finite and >= 0, got {all:?}"));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err("at least one weight must be positive".into());
        }
        Ok(())
    }
}

/// How a full level chooses the entry to discard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EvictionPolicy {
    /// Least recently accessed.
    Lru,
    /// Fewest accesses; ties broken by oldest insertion.
    Lfu,
    /// Oldest insertion.
    Fifo,
    /// Lowest weighted score of recency, frequency and TTL remaining.
    Adaptive(AdaptiveWeights),
}

impl EvictionPolicy {
    /// Adaptive policy with equal weights.
    pub fn adaptive() -> Self {
        Self::Adaptive(AdaptiveWeights::default())
    }

    /// Short lowercase name, for logs and statistics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
            Self::Adaptive(_) => "adaptive",
        }
    }

    /// Pick the entry to evict, or `None` if the level is empty.
    pub(crate) fn select_victim<K, V>(
        &self,
        entries: &HashMap<K, CacheEntry<V>>,
        clock: u64,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Option<K>
    where
        K: Eq + Hash + Clone,
    {
        let victim = match self {
            Self::Lru => entries.iter().min_by_key(|(_, e)| (e.last_accessed_seq, e.inserted_seq)),
            Self::Lfu => entries.iter().min_by_key(|(_, e)| (e.access_count, e.inserted_seq)),
            Self::Fifo => entries.iter().min_by_key(|(_, e)| e.inserted_seq),
            Self::Adaptive(weights) => {
                let scorer = AdaptiveScorer::new(weights, entries, clock, ttl, now);
                entries.iter().min_by(|(_, a), (_, b)| {
                    scorer
                        .score(a)
                        .total_cmp(&scorer.score(b))
                        .then(a.inserted_seq.cmp(&b.inserted_seq))
                })
            }
        };
        victim.map(|(k, _)| k.clone())
    }
}

/// Normalising context for adaptive scores over one level snapshot.
struct AdaptiveScorer<'w> {
    weights: &'w AdaptiveWeights,
    clock: u64,
    oldest_access: u64,
    max_count: u64,
    ttl: Option<Duration>,
    now: Instant,
}

impl<'w> AdaptiveScorer<'w> {
    fn new<K, V>(
        weights: &'w AdaptiveWeights,
        entries: &HashMap<K, CacheEntry<V>>,
        clock: u64,
        ttl: Option<Duration>,
        now: Instant,
    ) -> Self {
        let oldest_access = entries
            .values()
            .map(|e| e.last_accessed_seq)
            .min()
            .unwrap_or(clock);
        let max_count = entries.values().map(|e| e.access_count).max().unwrap_or(0);
        Self {
            weights,
            clock,
            oldest_access,
            max_count,
            ttl,
            now,
        }
    }

    fn score<V>(&self, entry: &CacheEntry<V>) -> f64 {
        let span = self.clock.saturating_sub(self.oldest_access);
        let recency = if span == 0 {
            1.0
        } else {
            1.0 - self.clock.saturating_sub(entry.last_accessed_seq) as f64 / span as f64
        };
        let frequency = if self.max_count == 0 {
            0.0
        } else {
            entry.access_count as f64 / self.max_count as f64
        };
        let ttl_left = match self.ttl {
            Some(ttl) => {
                let age = entry.age(self.now).as_secs_f64();
                (1.0 - age / ttl.as_secs_f64()).clamp(0.0, 1.0)
            }
            None => 1.0,
        };
        self.weights.recency * recency
            + self.weights.frequency * frequency
            + self.weights.ttl * ttl_left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a level where entry `k` was inserted at seq `k`, then apply
    /// `(key, seq)` hits.
    fn level(keys: &[u32], hits: &[(u32, u64)]) -> (HashMap<u32, CacheEntry<()>>, Instant) {
        let now = Instant::now();
        let mut entries: HashMap<u32, CacheEntry<()>> = keys
            .iter()
            .map(|&k| (k, CacheEntry::new((), now, k as u64)))
            .collect();
        for &(k, seq) in hits {
            entries.get_mut(&k).unwrap().touch(seq);
        }
        (entries, now)
    }

    #[test]
    fn lru_evicts_least_recently_accessed() {
        let (entries, now) = level(&[1, 2, 3], &[(1, 10), (3, 11)]);
        assert_eq!(EvictionPolicy::Lru.select_victim(&entries, 12, None, now), Some(2));
    }

    #[test]
    fn lfu_evicts_least_frequent() {
        let (entries, now) = level(&[1, 2, 3], &[(1, 10), (1, 11), (2, 12), (3, 13)]);
        // 2 and 3 both have one hit; 2 was inserted first.
        assert_eq!(EvictionPolicy::Lfu.select_victim(&entries, 14, None, now), Some(2));
    }

    #[test]
    fn lfu_tie_goes_to_oldest_insertion() {
        let (entries, now) = level(&[5, 3, 4], &[]);
        assert_eq!(EvictionPolicy::Lfu.select_victim(&entries, 6, None, now), Some(3));
    }

    #[test]
    fn fifo_ignores_access() {
        let (entries, now) = level(&[1, 2], &[(1, 10), (1, 11)]);
        assert_eq!(EvictionPolicy::Fifo.select_victim(&entries, 12, None, now), Some(1));
    }

    #[test]
    fn adaptive_prefers_keeping_hot_entries() {
        let (entries, now) = level(&[1, 2, 3], &[(1, 10), (1, 11), (3, 12), (3, 13)]);
        // Entry 2 is neither recent nor frequent.
        let victim = EvictionPolicy::adaptive().select_victim(&entries, 14, None, now);
        assert_eq!(victim, Some(2));
    }

    #[test]
    fn adaptive_frequency_only_matches_lfu() {
        let weights = AdaptiveWeights {
            recency: 0.0,
            frequency: 1.0,
            ttl: 0.0,
        };
        let (entries, now) = level(&[1, 2, 3], &[(2, 10), (3, 11), (3, 12), (1, 13), (1, 14)]);
        let adaptive = EvictionPolicy::Adaptive(weights).select_victim(&entries, 15, None, now);
        let lfu = EvictionPolicy::Lfu.select_victim(&entries, 15, None, now);
        assert_eq!(adaptive, lfu);
        assert_eq!(adaptive, Some(2));
    }

    #[test]
    fn empty_level_has_no_victim() {
        let entries: HashMap<u32, CacheEntry<()>> = HashMap::new();
        assert_eq!(EvictionPolicy::Lru.select_victim(&entries, 0, None, Instant::now()), None);
    }

    #[test]
    fn weights_validation() {
        assert!(AdaptiveWeights::default().validate().is_ok());
        let negative = AdaptiveWeights {
            recency: -1.0,
            frequency: 1.0,
            ttl: 1.0,
        };
        assert!(negative.validate().is_err());
    }
}
