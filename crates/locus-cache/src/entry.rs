//! Internal per-entry bookkeeping.

use std::time::{Duration, Instant};

/// A cached value with the counters eviction policies read.
///
/// Recency is tracked with the cache's logical clock rather than
/// `Instant`, so two operations within one clock tick still order.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) inserted_at: Instant,
    pub(crate) inserted_seq: u64,
    pub(crate) last_accessed_seq: u64,
    pub(crate) access_count: u64,
    /// Set when the entry was stored by the predictor, cleared on its
    /// first hit so each preload counts as useful at most once.
    pub(crate) preloaded: bool,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, now: Instant, seq: u64) -> Self {
        Self {
            value,
            inserted_at: now,
            inserted_seq: seq,
            last_accessed_seq: seq,
            access_count: 0,
            preloaded: false,
        }
    }

    pub(crate) fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    pub(crate) fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| self.age(now) >= ttl)
    }

    /// Record a hit at logical time `seq`.
    pub(crate) fn touch(&mut self, seq: u64) {
        self.last_accessed_seq = seq;
        self.access_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ttl_never_expires() {
        let now = Instant::now();
        let e = CacheEntry::new(1u32, now, 0);
        assert!(!e.is_expired(None, now + Duration::from_secs(3600)));
    }

    #[test]
    fn expires_at_ttl_boundary() {
        let now = Instant::now();
        let e = CacheEntry::new(1u32, now, 0);
        let ttl = Some(Duration::from_millis(10));
        assert!(!e.is_expired(ttl, now + Duration::from_millis(9)));
        assert!(e.is_expired(ttl, now + Duration::from_millis(10)));
    }

    #[test]
    fn touch_bumps_recency_and_frequency() {
        let mut e = CacheEntry::new("v", Instant::now(), 3);
        e.touch(7);
        e.touch(9);
        assert_eq!(e.last_accessed_seq, 9);
        assert_eq!(e.access_count, 2);
    }
}
