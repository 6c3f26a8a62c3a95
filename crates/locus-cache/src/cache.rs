//! The [`MultiLevelCache`] itself.
//!
//! All state sits behind one cache-wide mutex, so recency and frequency
//! bookkeeping never loses updates under concurrent `get`/`set`. Every
//! operation is bounded by the number of cached entries and performs no
//! I/O, so holding the lock for its duration is fine.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::{CacheConfig, LevelConfig, PreloadStrategy};
use crate::entry::CacheEntry;
use crate::error::{CacheConfigError, CacheError};
use crate::predict::PatternPredictor;
use crate::stats::{CacheStats, LevelStats};

/// A keyed cache with named levels.
///
/// `get` scans levels in configuration order and returns the first live
/// entry. `set` stores into one named level; a key lives in at most one
/// level at a time, so setting it elsewhere moves it.
///
/// # Example
///
/// ```
/// use locus_cache::{CacheConfig, EvictionPolicy, LevelConfig, MultiLevelCache};
///
/// let config = CacheConfig::builder()
///     .level(LevelConfig::new("l1", 2, EvictionPolicy::Lru))
///     .build()
///     .unwrap();
/// let cache = MultiLevelCache::new(config).unwrap();
/// cache.set("a", 1, "l1").unwrap();
/// cache.set("b", 2, "l1").unwrap();
/// assert_eq!(cache.get(&"a"), Some(1));
/// cache.set("c", 3, "l1").unwrap(); // evicts "b"
/// assert_eq!(cache.get(&"b"), None);
/// ```
pub struct MultiLevelCache<K, V> {
    configs: Vec<LevelConfig>,
    predictive_level: Option<usize>,
    pattern_key: Option<PatternKeyFn<K>>,
    inner: Mutex<Inner<K, V>>,
}

type PatternKeyFn<K> = Box<dyn Fn(&K) -> K + Send + Sync>;

// Compile-time assertion: the cache must be shareable across threads.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<MultiLevelCache<String, Vec<u8>>>();
};

struct Inner<K, V> {
    levels: Vec<Level<K, V>>,
    /// Logical clock, advanced once per operation.
    clock: u64,
    hits: u64,
    misses: u64,
    lookup_time: Duration,
    preloads: u64,
    preload_hits: u64,
    predictor: Option<PatternPredictor<K>>,
}

struct Level<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    evictions: u64,
    expirations: u64,
}

impl<K, V> Level<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            evictions: 0,
            expirations: 0,
        }
    }
}

impl<K, V> Inner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

impl<K, V> MultiLevelCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Build a cache from a validated configuration.
    ///
    /// # Errors
    ///
    /// Any [`CacheConfigError`] reported by [`CacheConfig::validate`].
    pub fn new(config: CacheConfig) -> Result<Self, CacheConfigError> {
        config.validate()?;
        let predictive_level = config.levels.iter().position(|l| l.preload.is_some());
        let predictor = predictive_level.and_then(|idx| match &config.levels[idx].preload {
            Some(PreloadStrategy::Pattern {
                min_occurrences,
                max_predictions,
            }) => Some(PatternPredictor::new(
                *min_occurrences,
                *max_predictions,
                config.max_tracked_patterns,
            )),
            None => None,
        });
        let levels = config.levels.iter().map(|_| Level::new()).collect();
        Ok(Self {
            configs: config.levels,
            predictive_level,
            pattern_key: None,
            inner: Mutex::new(Inner {
                levels,
                clock: 0,
                hits: 0,
                misses: 0,
                lookup_time: Duration::ZERO,
                preloads: 0,
                preload_hits: 0,
                predictor,
            }),
        })
    }

    /// Map keys to the form the pattern predictor records.
    ///
    /// Keys that embed a version (so stale values are never served) can
    /// strip it here, letting access patterns outlive version bumps.
    /// [`predict`](Self::predict) then returns normalised keys.
    pub fn with_pattern_key(mut self, f: impl Fn(&K) -> K + Send + Sync + 'static) -> Self {
        self.pattern_key = Some(Box::new(f));
        self
    }

    fn pattern_of(&self, key: &K) -> K {
        match &self.pattern_key {
            Some(f) => f(key),
            None => key.clone(),
        }
    }

    /// Level names in lookup order.
    pub fn level_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.configs.iter().map(|l| l.name.as_str())
    }

    /// Name of the level predictive preloads go to, if any.
    pub fn predictive_level(&self) -> Option<&str> {
        self.predictive_level.map(|i| self.configs[i].name.as_str())
    }

    fn level_index(&self, name: &str) -> Result<usize, CacheError> {
        self.configs
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| CacheError::UnknownLevel { level: name.into() })
    }

    /// Look up `key`, returning a clone of the first live entry.
    ///
    /// Expired entries met on the way are purged and count as misses for
    /// their level. A hit updates the entry's recency and frequency.
    pub fn get(&self, key: &K) -> Option<V> {
        let started = Instant::now();
        let mut inner = self.inner.lock();
        let seq = inner.tick();
        let now = Instant::now();

        let mut found = None;
        let mut preload_hit = false;
        for (idx, level) in inner.levels.iter_mut().enumerate() {
            let config = &self.configs[idx];
            let Some(entry) = level.entries.get_mut(key) else {
                continue;
            };
            if entry.is_expired(config.ttl, now) {
                level.entries.remove(key);
                level.expirations += 1;
                trace!(level = %config.name, "cache entry expired on read");
                continue;
            }
            entry.touch(seq);
            if entry.preloaded {
                entry.preloaded = false;
                preload_hit = true;
            }
            level.hits += 1;
            trace!(level = %config.name, "cache hit");
            found = Some(entry.value.clone());
            break;
        }

        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
            trace!("cache miss");
        }
        if preload_hit {
            inner.preload_hits += 1;
        }
        if let Some(predictor) = inner.predictor.as_mut() {
            predictor.observe(&self.pattern_of(key));
        }
        inner.lookup_time += started.elapsed();
        found
    }

    /// Whether `key` has a live entry, without touching any bookkeeping.
    pub fn contains(&self, key: &K) -> bool {
        self.level_of(key).is_some()
    }

    /// Name of the level holding a live entry for `key`.
    pub fn level_of(&self, key: &K) -> Option<&str> {
        let inner = self.inner.lock();
        let now = Instant::now();
        let found = inner
            .levels
            .iter()
            .zip(&self.configs)
            .find(|(level, config)| {
                level
                    .entries
                    .get(key)
                    .is_some_and(|e| !e.is_expired(config.ttl, now))
            })
            .map(|(_, config)| config.name.as_str());
        found
    }

    /// Store `value` under `key` in the named level.
    ///
    /// If the level is full, expired entries are purged first and then
    /// one victim is evicted according to the level's policy. Capacity is
    /// at least one by construction, so this always succeeds for a known
    /// level.
    ///
    /// # Errors
    ///
    /// [`CacheError::UnknownLevel`] if no level has this name.
    pub fn set(&self, key: K, value: V, level: &str) -> Result<(), CacheError> {
        let idx = self.level_index(level)?;
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, idx, key, value, false);
        Ok(())
    }

    /// Store a predicted value in the predictive level.
    ///
    /// Returns `false` (and stores nothing) when no level has a preload
    /// strategy or `key` is already cached anywhere.
    pub fn preload(&self, key: K, value: V) -> bool {
        let Some(idx) = self.predictive_level else {
            return false;
        };
        let mut inner = self.inner.lock();
        if inner.levels.iter().any(|l| l.entries.contains_key(&key)) {
            return false;
        }
        self.insert_locked(&mut inner, idx, key, value, true);
        inner.preloads += 1;
        true
    }

    /// Keys the pattern predictor expects to be requested after `key`,
    /// in pattern form (see [`with_pattern_key`](Self::with_pattern_key)).
    ///
    /// Empty when no level has a preload strategy.
    pub fn predict(&self, key: &K) -> Vec<K> {
        let pattern = self.pattern_of(key);
        self.inner
            .lock()
            .predictor
            .as_ref()
            .map(|p| p.predict(&pattern))
            .unwrap_or_default()
    }

    /// Forget recorded access patterns whose pattern key matches `pred`.
    pub fn forget_patterns_where(&self, pred: impl FnMut(&K) -> bool) {
        if let Some(predictor) = self.inner.lock().predictor.as_mut() {
            predictor.forget_where(pred);
        }
    }

    fn insert_locked(&self, inner: &mut Inner<K, V>, idx: usize, key: K, value: V, preloaded: bool) {
        let seq = inner.tick();
        let now = Instant::now();
        let config = &self.configs[idx];

        for (other, level) in inner.levels.iter_mut().enumerate() {
            if other != idx {
                level.entries.remove(&key);
            }
        }

        let level = &mut inner.levels[idx];
        if !level.entries.contains_key(&key) && level.entries.len() >= config.max_size {
            let before = level.entries.len();
            level.entries.retain(|_, e| !e.is_expired(config.ttl, now));
            level.expirations += (before - level.entries.len()) as u64;
        }
        if !level.entries.contains_key(&key) && level.entries.len() >= config.max_size {
            if let Some(victim) =
                config
                    .eviction_policy
                    .select_victim(&level.entries, seq, config.ttl, now)
            {
                level.entries.remove(&victim);
                level.evictions += 1;
                debug!(
                    level = %config.name,
                    policy = config.eviction_policy.name(),
                    "evicted cache entry"
                );
            }
        }

        let mut entry = CacheEntry::new(value, now, seq);
        entry.preloaded = preloaded;
        level.entries.insert(key, entry);
    }

    /// Remove `key` from every level. Returns `false` if it was absent.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let mut removed = false;
        for level in &mut inner.levels {
            removed |= level.entries.remove(key).is_some();
        }
        removed
    }

    /// Remove every entry whose key matches `pred`; returns how many.
    ///
    /// Recorded access patterns are kept; see
    /// [`forget_patterns_where`](Self::forget_patterns_where).
    pub fn remove_where(&self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let mut inner = self.inner.lock();
        let mut removed = 0;
        for level in &mut inner.levels {
            let before = level.entries.len();
            level.entries.retain(|k, _| !pred(k));
            removed += before - level.entries.len();
        }
        if removed > 0 {
            debug!(removed, "removed cache entries by predicate");
        }
        removed
    }

    /// Drop every expired entry now; returns how many.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let mut purged = 0;
        for (level, config) in inner.levels.iter_mut().zip(&self.configs) {
            let before = level.entries.len();
            level.entries.retain(|_, e| !e.is_expired(config.ttl, now));
            let n = before - level.entries.len();
            level.expirations += n as u64;
            purged += n;
        }
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        purged
    }

    /// Empty every level and reset all statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for level in &mut inner.levels {
            *level = Level::new();
        }
        inner.hits = 0;
        inner.misses = 0;
        inner.lookup_time = Duration::ZERO;
        inner.preloads = 0;
        inner.preload_hits = 0;
        if let Some(predictor) = inner.predictor.as_mut() {
            predictor.reset();
        }
    }

    /// Number of stored entries across all levels (unpurged expired included).
    pub fn len(&self) -> usize {
        self.inner.lock().levels.iter().map(|l| l.entries.len()).sum()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        let average_access_latency = if lookups == 0 {
            Duration::ZERO
        } else {
            inner.lookup_time / u32::try_from(lookups).unwrap_or(u32::MAX)
        };
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            average_access_latency,
            levels: inner
                .levels
                .iter()
                .zip(&self.configs)
                .map(|(level, config)| LevelStats {
                    name: config.name.clone(),
                    policy: config.eviction_policy.name(),
                    len: level.entries.len(),
                    capacity: config.max_size,
                    hits: level.hits,
                    evictions: level.evictions,
                    expirations: level.expirations,
                })
                .collect(),
            preloads: inner.preloads,
            preload_hits: inner.preload_hits,
        }
    }
}

impl<K, V> std::fmt::Debug for MultiLevelCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiLevelCache")
            .field("levels", &self.configs)
            .finish_non_exhaustive()
    }
}
