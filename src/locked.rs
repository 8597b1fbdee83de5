use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::ptr;

use log::trace;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::store::Store;

/// A `HashMap` behind a single reader/writer lock.
///
/// Mutations take the lock exclusively, reads share it. Every operation,
/// including whole-container ones such as `size`, `clone_and_clear` or the
/// [`Functional`](crate::Functional) transformations, is linearizable.
///
/// Absent keys read as `V::default()`; use [`LockedMap::get_checked`] to tell
/// an absent key from a stored default.
///
/// #   Deadlocks
///
/// The lock is not reentrant: a callback handed to `for_each*` (or to any
/// transformation) must not call back into the same map.
pub struct LockedMap<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> LockedMap<K, V> {
    /// Creates an empty map. No memory is allocated.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty map able to hold at least `capacity` entries without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Complement of [`LockedMap::is_empty`]; the map has no fixed capacity.
    #[doc(alias = "is_full")]
    pub fn is_non_empty(&self) -> bool {
        self.size() != 0
    }

    /// Removes all entries.
    ///
    /// The backing storage is replaced, releasing any pre-allocated capacity.
    pub fn clear(&self) {
        let old = mem::take(&mut *self.data.write());
        trace!("cleared locked map of {} entries", old.len());
    }

    /// Calls `f` on every entry, holding the shared lock throughout.
    ///
    /// #   Deadlocks
    ///
    /// `f` must not access this map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let data = self.data.read();
        for (key, value) in data.iter() {
            f(key, value);
        }
    }

    /// Calls `f` on every key, holding the shared lock throughout.
    pub fn for_each_key<F>(&self, mut f: F)
    where
        F: FnMut(&K),
    {
        let data = self.data.read();
        data.keys().for_each(|key| f(key));
    }

    /// Calls `f` on every value, holding the shared lock throughout.
    pub fn for_each_value<F>(&self, mut f: F)
    where
        F: FnMut(&V),
    {
        let data = self.data.read();
        data.values().for_each(|value| f(value));
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        self.data.write()
    }

    //  Returns whether any entry satisfies `predicate`, stopping at the first.
    pub(crate) fn any<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        let data = self.data.read();
        data.iter().any(|(key, value)| predicate(key, value))
    }
}

impl<K, V> LockedMap<K, V>
where
    K: Eq + Hash,
{
    /// Associates `value` to `key`, overwriting any previous value.
    pub fn set(&self, key: K, value: V) {
        self.replace(key, value);
    }

    /// Returns the value associated to `key`, or `V::default()`.
    pub fn get(&self, key: &K) -> V
    where
        V: Clone + Default,
    {
        self.get_checked(key).0
    }

    /// Returns the value associated to `key` and whether it was present.
    ///
    /// ```
    /// use syncmap::LockedMap;
    ///
    /// let map = LockedMap::new();
    /// map.set("zero", 0);
    ///
    /// assert_eq!((0, true), map.get_checked(&"zero"));
    /// assert_eq!((0, false), map.get_checked(&"one"));
    /// ```
    pub fn get_checked(&self, key: &K) -> (V, bool)
    where
        V: Clone + Default,
    {
        match self.data.read().get(key) {
            Some(value) => (value.clone(), true),
            None => (V::default(), false),
        }
    }

    /// Removes `key`, returning its value and whether it was present.
    pub fn get_and_delete(&self, key: &K) -> (V, bool)
    where
        V: Default,
    {
        match self.take(key) {
            Some(value) => (value, true),
            None => (V::default(), false),
        }
    }

    /// Removes `key`; does nothing if it is absent.
    pub fn delete(&self, key: &K) {
        self.take(key);
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.data.read().contains_key(key)
    }

    /// Returns `key` if it is present, or `K::default()`.
    pub fn key(&self, key: &K) -> K
    where
        K: Clone + Default,
    {
        if self.contains_key(key) {
            key.clone()
        } else {
            K::default()
        }
    }

    /// Returns whether any entry holds a value equal to `value`.
    ///
    /// Linear in the number of entries.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.any(|_, v| v == value)
    }

    /// Snapshot of the keys, in no particular order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.data.read().keys().cloned().collect()
    }

    /// Snapshot of the values, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.data.read().values().cloned().collect()
    }

    /// Empties the map, returning its former content.
    ///
    /// Both happen under one exclusive acquisition: a concurrent `set` lands
    /// either in the returned map or in `self`, never in both.
    pub fn clone_and_clear(&self) -> Self {
        let data = mem::take(&mut *self.data.write());
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns whether both maps hold the same keys mapped to equal values.
    ///
    /// Comparing a map with itself is fine. Both locks are taken in a fixed
    /// order, so concurrent `a.deep_equal(&b)` and `b.deep_equal(&a)` do not
    /// deadlock.
    pub fn deep_equal(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        if ptr::eq(self, other) {
            return true;
        }

        let (first, second) = if (self as *const Self) < (other as *const Self) {
            (self, other)
        } else {
            (other, self)
        };

        let first = first.data.read();
        let second = second.data.read();

        *first == *second
    }

    //  Whether `key` maps to a value equal to `value`.
    //
    //  Uses a recursive read so that a caller already holding another map's
    //  lock never queues behind a pending writer here.
    pub(crate) fn holds(&self, key: &K, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.data.read_recursive().get(key) == Some(value)
    }

    //  Single-key reads for callers that may already hold this lock, shared,
    //  further up the stack.
    pub(crate) fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.data.read_recursive().get(key).cloned()
    }

    pub(crate) fn contains_key_recursive(&self, key: &K) -> bool {
        self.data.read_recursive().contains_key(key)
    }

    pub(crate) fn replace(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    pub(crate) fn take(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }
}

impl<K, V> Store<K, V> for LockedMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn fresh(&self, capacity: usize) -> Self {
        Self::with_capacity(capacity)
    }

    fn lookup(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.set(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        self.take(key)
    }

    fn len(&self) -> usize {
        self.size()
    }

    fn scan<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        self.for_each(f);
    }
}

impl<K, V> Default for LockedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Clone for LockedMap<K, V> {
    /// Copies the entries under the shared lock of `self`.
    fn clone(&self) -> Self {
        let data = self.data.read().clone();
        Self {
            data: RwLock::new(data),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LockedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data.read();
        f.debug_map().entries(data.iter()).finish()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for LockedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<K: Eq + Hash, V> Extend<(K, V)> for LockedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.data.get_mut().extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crossbeam_utils::thread;

    use super::LockedMap;

    use crate::tester::*;

    #[test]
    fn absent_key_reads_default() {
        init_logger();

        let map: LockedMap<&str, i32> = LockedMap::new();

        assert_eq!(0, map.get(&"missing"));
        assert_eq!((0, false), map.get_checked(&"missing"));
        assert_eq!((0, false), map.get_and_delete(&"missing"));
        assert!(!map.contains_key(&"missing"));
    }

    #[test]
    fn set_and_get() {
        let map = LockedMap::with_capacity(8);
        assert!(map.is_empty());

        map.set(1, "one");
        assert_eq!(("one", true), map.get_checked(&1));
        assert_eq!(1, map.size());
        assert!(map.is_non_empty());

        map.set(1, "uno");
        assert_eq!("uno", map.get(&1));
        assert_eq!(1, map.size());

        map.set(2, "two");
        assert_eq!(2, map.size());
    }

    #[test]
    fn stored_default_is_present() {
        let map = LockedMap::new();
        map.set("zero", 0);

        assert_eq!(0, map.get(&"zero"));
        assert_eq!((0, true), map.get_checked(&"zero"));
    }

    #[test]
    fn delete_is_idempotent() {
        let map: LockedMap<_, _> = (0..4).map(|i| (i, i * 10)).collect();

        map.delete(&2);
        assert_eq!(3, map.size());
        assert!(!map.contains_key(&2));

        map.delete(&2);
        map.delete(&42);
        assert_eq!(3, map.size());
        assert_eq!(30, map.get(&3));
    }

    #[test]
    fn key() {
        let map = LockedMap::new();
        map.set(7u32, "seven");

        assert_eq!(7, map.key(&7));
        assert_eq!(0, map.key(&8));
    }

    #[test]
    fn get_and_delete() {
        let map = LockedMap::new();
        map.set("a", 1);

        assert_eq!((1, true), map.get_and_delete(&"a"));
        assert_eq!((0, false), map.get_and_delete(&"a"));
        assert!(map.is_empty());
    }

    #[test]
    fn clear() {
        let map: LockedMap<_, _> = (0..100).map(|i| (i, i)).collect();

        map.clear();
        assert_eq!(0, map.size());
        assert!(map.is_empty());
        assert!(!map.is_non_empty());

        map.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn contains_value() {
        let map = constants(LockedMap::new());

        assert!(map.contains_value(&2.71828));
        assert!(!map.contains_value(&1.0));
    }

    #[test]
    fn keys_and_values_are_snapshots() {
        let map = constants(LockedMap::new());

        let keys = map.keys();
        let values = map.values();
        map.clear();

        let keys: HashSet<_> = keys.into_iter().collect();
        assert_eq!(hash_set(&["pi", "e", "phi"]), keys);

        let mut values = values;
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(vec![PHI, E, PI], values);
    }

    #[test]
    fn for_each_visits_every_entry() {
        let map: LockedMap<_, _> = (0..10).map(|i| (i, i * 2)).collect();

        let mut sum = 0;
        map.for_each(|key, value| {
            assert_eq!(key * 2, *value);
            sum += value;
        });
        assert_eq!(90, sum);

        let mut keys = 0;
        map.for_each_key(|key| keys += key);
        assert_eq!(45, keys);

        let mut values = 0;
        map.for_each_value(|value| values += value);
        assert_eq!(90, values);
    }

    #[test]
    fn panicking_callback_releases_lock() {
        let map = LockedMap::new();
        map.set(1, 1);

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            map.for_each(|_, _| panic!("callback failure"));
        }));
        assert!(panicked.is_err());

        map.set(2, 2);
        assert_eq!(2, map.size());
    }

    #[test]
    fn clone_is_independent() {
        let map = constants(LockedMap::new());
        let clone = map.clone();

        assert!(clone.deep_equal(&map));

        clone.set("tau".to_string(), 6.28318);
        clone.delete(&"pi".to_string());

        assert_eq!(3, map.size());
        assert_eq!(PI, map.get(&"pi".to_string()));
        assert!(!map.contains_key(&"tau".to_string()));
        assert!(!clone.deep_equal(&map));
    }

    #[test]
    fn clone_and_clear() {
        let map = constants(LockedMap::new());
        let snapshot = map.clone();

        let taken = map.clone_and_clear();

        assert!(map.is_empty());
        assert!(taken.deep_equal(&snapshot));

        map.set("i".to_string(), -1.0);
        assert_eq!(3, taken.size());
    }

    #[test]
    fn deep_equal() {
        let map = constants(LockedMap::new());
        let other = constants(LockedMap::with_capacity(64));

        assert!(map.deep_equal(&map));
        assert!(map.deep_equal(&other));
        assert!(other.deep_equal(&map));

        other.set("e".to_string(), 2.0);
        assert!(!map.deep_equal(&other));

        other.set("e".to_string(), E);
        other.set("tau".to_string(), 6.28318);
        assert!(!map.deep_equal(&other));

        let empty: LockedMap<String, f64> = LockedMap::new();
        assert!(empty.deep_equal(&LockedMap::new()));
    }

    #[test]
    fn debug() {
        let map = LockedMap::new();
        map.set(1, "one");

        assert_eq!("{1: \"one\"}", format!("{:?}", map));
    }

    #[test]
    fn extend() {
        let mut map = LockedMap::new();
        map.extend((0..5).map(|i| (i, i)));
        map.extend((3..8).map(|i| (i, i)));

        assert_eq!(8, map.size());
    }

    #[test]
    fn concurrent_disjoint_sets() {
        init_logger();

        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let map = LockedMap::new();

        thread::scope(|s| {
            for t in 0..THREADS {
                let map = &map;
                s.spawn(move |_| {
                    for i in 0..PER_THREAD {
                        map.set(t * PER_THREAD + i, t);
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(THREADS * PER_THREAD, map.size());
    }

    #[test]
    fn concurrent_clone_and_clear_loses_nothing() {
        init_logger();

        const WRITERS: usize = 4;
        const PER_WRITER: usize = 2_000;

        let map = LockedMap::new();
        let (sender, receiver) = crossbeam_channel::unbounded();

        thread::scope(|s| {
            for t in 0..WRITERS {
                let map = &map;
                s.spawn(move |_| {
                    for i in 0..PER_WRITER {
                        map.set(t * PER_WRITER + i, ());
                    }
                });
            }

            let map = &map;
            s.spawn(move |_| {
                for _ in 0..50 {
                    sender.send(map.clone_and_clear()).unwrap();
                }
            });
        })
        .unwrap();

        let mut seen = HashSet::new();
        let mut total = 0;
        for batch in receiver.iter().chain(Some(map.clone_and_clear())) {
            total += batch.size();
            batch.for_each_key(|key| {
                seen.insert(*key);
            });
        }

        assert_eq!(WRITERS * PER_WRITER, total);
        assert_eq!(WRITERS * PER_WRITER, seen.len());
    }

    #[test]
    fn concurrent_cross_deep_equal() {
        let a = constants(LockedMap::new());
        let b = constants(LockedMap::new());

        thread::scope(|s| {
            s.spawn(|_| {
                for _ in 0..1_000 {
                    a.deep_equal(&b);
                }
            });
            s.spawn(|_| {
                for _ in 0..1_000 {
                    b.deep_equal(&a);
                }
            });
            s.spawn(|_| {
                for i in 0..1_000 {
                    a.set("tmp".to_string(), i as f64);
                    b.set("tmp".to_string(), i as f64);
                }
            });
        })
        .unwrap();

        assert!(a.deep_equal(&b));
    }
}
