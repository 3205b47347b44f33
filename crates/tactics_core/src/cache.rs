//! Round-scoped memoization.
//!
//! Every score is recomputed at most once per (round, side). A
//! [`RoundCache`] remembers the stamp it was filled under and drops all of its
//! entries the first time it sees a different one.

use std::collections::HashMap;
use std::hash::Hash;

use crate::snapshot::Side;

/// Identifies the round a cached value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundStamp {
    /// Round number.
    pub round: u32,
    /// Side the round was computed for.
    pub side: Side,
}

/// A map that forgets everything when the round stamp changes.
#[derive(Debug, Clone)]
pub struct RoundCache<K, V> {
    stamp: Option<RoundStamp>,
    values: HashMap<K, V>,
    computations: u64,
}

impl<K, V> Default for RoundCache<K, V> {
    fn default() -> Self {
        Self {
            stamp: None,
            values: HashMap::new(),
            computations: 0,
        }
    }
}

impl<K: Eq + Hash, V: Clone> RoundCache<K, V> {
    /// Empty cache with no stamp.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all entries if `stamp` differs from the stored one.
    pub fn sync(&mut self, stamp: RoundStamp) {
        if self.stamp != Some(stamp) {
            self.values.clear();
            self.stamp = Some(stamp);
        }
    }

    /// Cached value for `key`, if computed under the current stamp.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.values.get(key).cloned()
    }

    /// Store a freshly computed value.
    pub fn insert(&mut self, key: K, value: V) -> V {
        self.computations += 1;
        self.values.insert(key, value.clone());
        value
    }

    /// Return the cached value or compute and store it.
    pub fn get_or_insert_with(
        &mut self,
        stamp: RoundStamp,
        key: K,
        compute: impl FnOnce() -> V,
    ) -> V {
        self.sync(stamp);
        if let Some(v) = self.values.get(&key) {
            return v.clone();
        }
        self.insert(key, compute())
    }

    /// Total number of values computed over the cache's lifetime.
    #[must_use]
    pub const fn computations(&self) -> u64 {
        self.computations
    }

    /// Entries held under the current stamp.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(round: u32) -> RoundStamp {
        RoundStamp {
            round,
            side: Side::First,
        }
    }

    #[test]
    fn test_computes_once_per_stamp() {
        let mut cache: RoundCache<u32, f64> = RoundCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache.get_or_insert_with(stamp(1), 7, || {
                calls += 1;
                2.5
            });
            assert!((v - 2.5).abs() < f64::EPSILON);
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_new_round_invalidates() {
        let mut cache: RoundCache<u32, u32> = RoundCache::new();
        cache.get_or_insert_with(stamp(1), 1, || 10);
        assert_eq!(cache.get_or_insert_with(stamp(2), 1, || 20), 20);
        assert_eq!(cache.computations(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_side_change_invalidates() {
        let mut cache: RoundCache<u32, u32> = RoundCache::new();
        cache.get_or_insert_with(stamp(1), 1, || 10);
        let other = RoundStamp {
            round: 1,
            side: Side::Second,
        };
        assert_eq!(cache.get_or_insert_with(other, 1, || 30), 30);
    }

    #[test]
    fn test_sync_same_stamp_keeps_entries() {
        let mut cache: RoundCache<u32, u32> = RoundCache::new();
        cache.sync(stamp(3));
        cache.insert(5, 50);
        cache.sync(stamp(3));
        assert_eq!(cache.get(&5), Some(50));
        cache.sync(stamp(4));
        assert!(cache.is_empty());
    }
}
