//! Access-sequence predictor behind [`PreloadStrategy::Pattern`](crate::PreloadStrategy).

use std::hash::Hash;

use indexmap::IndexMap;

/// Counts `previous key -> next key` transitions.
///
/// The table is bounded: when more than `max_sources` source keys are
/// tracked, the least recently observed source is forgotten. Each source
/// keeps at most `max_predictions * 4` successors; past that the least
/// frequent one is dropped.
#[derive(Debug)]
pub(crate) struct PatternPredictor<K> {
    transitions: IndexMap<K, IndexMap<K, u32>>,
    last: Option<K>,
    min_occurrences: u32,
    max_predictions: usize,
    max_sources: usize,
    max_successors: usize,
}

impl<K: Eq + Hash + Clone> PatternPredictor<K> {
    pub(crate) fn new(min_occurrences: u32, max_predictions: usize, max_sources: usize) -> Self {
        Self {
            transitions: IndexMap::new(),
            last: None,
            min_occurrences,
            max_predictions,
            max_sources: max_sources.max(1),
            max_successors: max_predictions.saturating_mul(4).max(1),
        }
    }

    /// Record an access to `key`, counting the transition from the
    /// previously accessed key.
    pub(crate) fn observe(&mut self, key: &K) {
        let previous = self.last.replace(key.clone());
        let Some(previous) = previous else {
            return;
        };
        if &previous == key {
            return;
        }
        // Move the source to the back so the front is the stalest.
        let mut successors = self.transitions.shift_remove(&previous).unwrap_or_default();
        *successors.entry(key.clone()).or_insert(0) += 1;
        if successors.len() > self.max_successors {
            // Never evict the transition just recorded.
            let rarest = successors
                .iter()
                .enumerate()
                .filter(|(_, (next, _))| *next != key)
                .min_by_key(|(_, (_, n))| **n)
                .map(|(i, _)| i);
            if let Some(i) = rarest {
                successors.shift_remove_index(i);
            }
        }
        self.transitions.insert(previous, successors);
        while self.transitions.len() > self.max_sources {
            self.transitions.shift_remove_index(0);
        }
    }

    /// Keys that followed `key` at least `min_occurrences` times, most
    /// frequent first.
    pub(crate) fn predict(&self, key: &K) -> Vec<K> {
        let Some(successors) = self.transitions.get(key) else {
            return Vec::new();
        };
        let mut candidates: Vec<(&K, u32)> = successors
            .iter()
            .filter(|(_, &n)| n >= self.min_occurrences)
            .map(|(k, &n)| (k, n))
            .collect();
        // Stable sort keeps first-seen order among equal counts.
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates
            .into_iter()
            .take(self.max_predictions)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Forget every recorded transition.
    pub(crate) fn reset(&mut self) {
        self.transitions.clear();
        self.last = None;
    }

    /// Drop transitions from or to keys matching `pred`.
    pub(crate) fn forget_where(&mut self, mut pred: impl FnMut(&K) -> bool) {
        self.transitions.retain(|source, successors| {
            if pred(source) {
                return false;
            }
            successors.retain(|next, _| !pred(next));
            !successors.is_empty()
        });
        if self.last.as_ref().is_some_and(&mut pred) {
            self.last = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_after_min_occurrences() {
        let mut p = PatternPredictor::new(2, 4, 16);
        for k in ["a", "b", "x", "a", "b"] {
            p.observe(&k);
        }
        assert_eq!(p.predict(&"a"), vec!["b"]);
        // x followed b only once.
        assert!(p.predict(&"b").is_empty());
    }

    #[test]
    fn orders_by_frequency_and_caps() {
        let mut p = PatternPredictor::new(1, 1, 16);
        for k in ["a", "c", "a", "b", "a", "b"] {
            p.observe(&k);
        }
        assert_eq!(p.predict(&"a"), vec!["b"]);
    }

    #[test]
    fn repeated_key_is_not_a_transition() {
        let mut p = PatternPredictor::new(1, 4, 16);
        p.observe(&"a");
        p.observe(&"a");
        assert!(p.predict(&"a").is_empty());
    }

    #[test]
    fn bounded_sources_forget_stalest() {
        let mut p = PatternPredictor::new(1, 4, 2);
        for k in ["a", "b", "c", "d"] {
            p.observe(&k);
        }
        // Sources a, b, c were recorded; a is the stalest and is dropped.
        assert!(p.predict(&"a").is_empty());
        assert_eq!(p.predict(&"c"), vec!["d"]);
    }

    #[test]
    fn successors_per_source_are_bounded() {
        // max_predictions 1 allows four successors per source.
        let mut p = PatternPredictor::new(1, 1, 16);
        for k in ["a", "b", "a", "b", "a", "c", "a", "d", "a", "e", "a", "f"] {
            p.observe(&k);
        }
        let successors = &p.transitions[&"a"];
        assert_eq!(successors.len(), 4);
        // c was the rarest and earliest when f arrived.
        assert!(!successors.contains_key(&"c"));
        assert!(successors.contains_key(&"f"));
        assert_eq!(p.predict(&"a"), vec!["b"]);
    }

    #[test]
    fn forget_where_drops_matching_keys() {
        let mut p = PatternPredictor::new(1, 4, 16);
        for k in ["a", "b", "a", "c"] {
            p.observe(&k);
        }
        p.forget_where(|k| *k == "b");
        assert_eq!(p.predict(&"a"), vec!["c"]);
        assert!(p.predict(&"b").is_empty());
    }
}
