use std::cmp::Ordering;

use crate::store::Store;

/// Transformations available on every [`Store`].
///
/// Each transformation makes a single [`Store::scan`] of the source and
/// builds fresh containers through [`Store::fresh`] and [`Store::insert`]. On
/// a [`LockedMap`](crate::LockedMap) the scan holds the shared lock
/// throughout, so the result reflects one consistent state of the source. On
/// a [`ConcurrentMap`](crate::ConcurrentMap) the scan goes shard by shard and
/// concurrent writes may or may not be reflected.
///
/// Callbacks receive borrowed entries and must not access the source.
///
/// ```
/// use syncmap::{Functional, LockedMap};
///
/// let map = LockedMap::new();
/// map.set("pi", 3.14159);
/// map.set("e", 2.71828);
/// map.set("phi", 1.61803);
///
/// let large = map.filter_value(|value| *value > 2.0);
/// assert_eq!(2, large.size());
///
/// let sorted = map.sort_values(|a, b| a.partial_cmp(b).unwrap());
/// assert_eq!(vec![1.61803, 2.71828, 3.14159], sorted);
/// ```
pub trait Functional<K: Clone, V: Clone>: Store<K, V> + Sized {
    /// Builds a new container from the entries returned by `f`.
    ///
    /// If `f` maps two entries to the same key, one of them wins.
    fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&K, &V) -> (K, V),
    {
        let result = self.fresh(self.size_hint());
        self.scan(|key, value| {
            let (key, value) = f(key, value);
            result.insert(key, value);
        });
        result
    }

    fn map_key<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&K) -> K,
    {
        self.map(|key, value| (f(key), value.clone()))
    }

    fn map_value<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&V) -> V,
    {
        self.map(|key, value| (key.clone(), f(value)))
    }

    /// Builds a new container holding the entries satisfying `predicate`.
    fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&K, &V) -> bool,
    {
        let result = self.fresh(self.size_hint());
        self.scan(|key, value| {
            if predicate(key, value) {
                result.insert(key.clone(), value.clone());
            }
        });
        result
    }

    fn filter_key<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&K) -> bool,
    {
        self.filter(|key, _| predicate(key))
    }

    fn filter_value<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&V) -> bool,
    {
        self.filter(|_, value| predicate(value))
    }

    /// Splits the entries in a single pass: those satisfying `predicate`, and
    /// the others.
    ///
    /// Every scanned entry lands in exactly one of the two containers.
    fn partition<F>(&self, mut predicate: F) -> (Self, Self)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let capacity = self.size_hint();
        let matching = self.fresh(capacity);
        let others = self.fresh(capacity);

        self.scan(|key, value| {
            let target = if predicate(key, value) { &matching } else { &others };
            target.insert(key.clone(), value.clone());
        });

        (matching, others)
    }

    fn partition_key<F>(&self, mut predicate: F) -> (Self, Self)
    where
        F: FnMut(&K) -> bool,
    {
        self.partition(|key, _| predicate(key))
    }

    fn partition_value<F>(&self, mut predicate: F) -> (Self, Self)
    where
        F: FnMut(&V) -> bool,
    {
        self.partition(|_, value| predicate(value))
    }

    /// Returns the keys ordered by `compare`.
    ///
    /// The sort is stable with respect to the scan order, which is itself
    /// unspecified.
    fn sort_keys<F>(&self, compare: F) -> Vec<K>
    where
        F: FnMut(&K, &K) -> Ordering,
    {
        let mut keys = Vec::with_capacity(self.size_hint());
        self.scan(|key, _| keys.push(key.clone()));

        keys.sort_by(compare);
        keys
    }

    /// Returns the values ordered by `compare`.
    ///
    /// Values are sorted alongside their keys, then the keys are dropped.
    fn sort_values<F>(&self, mut compare: F) -> Vec<V>
    where
        F: FnMut(&V, &V) -> Ordering,
    {
        let mut entries = Vec::with_capacity(self.size_hint());
        self.scan(|key, value| entries.push((key.clone(), value.clone())));

        entries.sort_by(|(_, a), (_, b)| compare(a, b));
        entries.into_iter().map(|(_, value)| value).collect()
    }
}

impl<K: Clone, V: Clone, S: Store<K, V>> Functional<K, V> for S {}
