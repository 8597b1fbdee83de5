use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace, warn};

use crate::locked::LockedMap;
use crate::options::{CountMode, Options};
use crate::store::Store;

/// A concurrent map without any container-wide lock.
///
/// Keys are spread over a fixed array of shards, each one a [`LockedMap`].
/// Operations on a single key lock only the shard owning it, so traffic on
/// disjoint keys rarely contends.
///
/// #   Limitations
///
/// -   Only single-key operations are linearizable. `size`, iteration,
///     cloning, sorting, `clear` and the [`Functional`](crate::Functional)
///     transformations visit the shards one after the other: under concurrent
///     writers they observe a mix of older and newer states.
/// -   `size` reads a separate counter. With the default
///     [`CountMode::Approximate`], every `set` increments it, overwrites
///     included, so overwriting existing keys inflates it. Use
///     [`CountMode::Exact`] when `size` must match the number of entries, or
///     [`ConcurrentMap::count_entries`] to count them.
///
/// #   Deadlocks
///
/// Callbacks run while the visited shard is read-locked: they must not write
/// to the map being visited. Single-key reads (`get`, `get_checked`,
/// `contains_key`) from a callback are fine, they never queue behind a
/// pending writer. Anything else must not access the map being visited.
pub struct ConcurrentMap<K, V> {
    shards: Box<[LockedMap<K, V>]>,
    hasher: RandomState,
    //  Number of entries, approximate or exact depending on the count mode.
    count: AtomicUsize,
    options: Options,
}

impl<K, V> ConcurrentMap<K, V> {
    /// Creates an empty map with default options.
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }

    /// Creates an empty map pre-sized for about `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_options(Options::new().capacity(capacity))
    }

    pub fn with_options(options: Options) -> Self {
        let shard_capacity = options.shard_capacity();
        let shards = vec_no_clone![LockedMap::with_capacity(shard_capacity); options.get_shards()];

        trace!(
            "created concurrent map: {} shards of capacity {}, {:?} count",
            shards.len(),
            shard_capacity,
            options.get_count_mode()
        );

        Self {
            shards: shards.into_boxed_slice(),
            hasher: RandomState::new(),
            count: AtomicUsize::new(0),
            options,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Value of the size counter.
    ///
    /// Exact only in [`CountMode::Exact`], once writers are quiescent.
    pub fn size(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Complement of [`ConcurrentMap::is_empty`]; the map has no fixed capacity.
    #[doc(alias = "is_full")]
    pub fn is_non_empty(&self) -> bool {
        self.size() != 0
    }

    /// Counts the entries shard by shard, ignoring the size counter.
    pub fn count_entries(&self) -> usize {
        self.shards.iter().map(LockedMap::size).sum()
    }

    /// Removes all entries.
    ///
    /// Each shard's storage is replaced in turn. In [`CountMode::Approximate`]
    /// the counter is then reset to zero, in [`CountMode::Exact`] it is
    /// decreased by what each shard held.
    pub fn clear(&self) {
        let mut removed = 0;

        for shard in self.shards.iter() {
            let mut data = shard.write();
            let old = mem::take(&mut *data);
            self.forget(old.len());
            drop(data);

            removed += old.len();
        }

        if self.options.get_count_mode() == CountMode::Approximate {
            self.count.store(0, Ordering::Release);
        }

        trace!("cleared concurrent map of {} entries", removed);
    }

    /// Calls `f` on every entry, one shard at a time.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for shard in self.shards.iter() {
            shard.for_each(&mut f);
        }
    }

    pub fn for_each_key<F>(&self, mut f: F)
    where
        F: FnMut(&K),
    {
        for shard in self.shards.iter() {
            shard.for_each_key(&mut f);
        }
    }

    pub fn for_each_value<F>(&self, mut f: F)
    where
        F: FnMut(&V),
    {
        for shard in self.shards.iter() {
            shard.for_each_value(&mut f);
        }
    }

    //  Records the removal of `removed` entries, in exact mode only.
    //
    //  Must be called while holding the lock of the shard they were removed
    //  from, so that it is ordered after the matching increments.
    fn forget(&self, removed: usize) {
        if self.options.get_count_mode() == CountMode::Exact {
            self.decrement(removed);
        }
    }

    fn decrement(&self, removed: usize) {
        if removed == 0 {
            return;
        }

        let previous = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.saturating_sub(removed))
            });

        if let Ok(previous) = previous {
            if previous < removed {
                warn!(
                    "size counter underflow ({} - {}), clamped to zero",
                    previous, removed
                );
            }
        }
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    /// Associates `value` to `key`, overwriting any previous value.
    ///
    /// In [`CountMode::Approximate`] the size counter is incremented even if
    /// `key` was already present.
    pub fn set(&self, key: K, value: V) {
        let mut data = self.shard(&key).write();
        let replaced = data.insert(key, value).is_some();

        if !replaced || self.options.get_count_mode() == CountMode::Approximate {
            self.count.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Returns the value associated to `key`, or `V::default()`.
    pub fn get(&self, key: &K) -> V
    where
        V: Clone + Default,
    {
        self.get_checked(key).0
    }

    /// Returns the value associated to `key` and whether it was present.
    pub fn get_checked(&self, key: &K) -> (V, bool)
    where
        V: Clone + Default,
    {
        match self.shard(key).peek(key) {
            Some(value) => (value, true),
            None => (V::default(), false),
        }
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

    /// Removes `key`, returning its value and whether it was present.
    ///
    /// Atomic with respect to other operations on `key`; the counter is
    /// decremented only if a value was removed.
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
        self.shard(key).contains_key_recursive(key)
    }

    /// Returns whether any entry holds a value equal to `value`.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.shards.iter().any(|shard| shard.contains_value(value))
    }

    /// Best-effort snapshot of the keys, in no particular order.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::with_capacity(self.count_entries());
        self.for_each_key(|key| keys.push(key.clone()));
        keys
    }

    /// Best-effort snapshot of the values, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        let mut values = Vec::with_capacity(self.count_entries());
        self.for_each_value(|value| values.push(value.clone()));
        values
    }

    /// Empties the map, returning its former content.
    ///
    /// Each shard is emptied under its own lock, so every entry ends up either
    /// in the returned map or, if set after its shard was visited, in `self`.
    /// The shards are not emptied all at once.
    pub fn clone_and_clear(&self) -> Self {
        let taken = Self::with_options(self.options.capacity(self.count_entries()));

        for shard in self.shards.iter() {
            let mut data = shard.write();
            let drained = mem::take(&mut *data);
            self.forget(drained.len());
            drop(data);

            for (key, value) in drained {
                taken.set(key, value);
            }
        }

        if self.options.get_count_mode() == CountMode::Approximate {
            self.count.store(0, Ordering::Release);
        }

        debug!("moved {} entries out of concurrent map", taken.size());
        taken
    }

    /// Returns whether both maps hold the same keys mapped to equal values.
    ///
    /// Entries are counted rather than compared through the size counters,
    /// which may have drifted. Not atomic: under concurrent writers the
    /// answer reflects some interleaving of the per-key states.
    pub fn deep_equal(&self, other: &Self) -> bool
    where
        V: PartialEq,
    {
        if ptr::eq(self, other) {
            return true;
        }

        let mut entries = 0;
        let mismatch = self.shards.iter().any(|shard| {
            shard.any(|key, value| {
                entries += 1;
                !other.shard(key).holds(key, value)
            })
        });

        !mismatch && entries == other.count_entries()
    }

    fn shard(&self, key: &K) -> &LockedMap<K, V> {
        let hash = self.hasher.hash_one(key) as usize;
        &self.shards[hash & (self.shards.len() - 1)]
    }

    fn take(&self, key: &K) -> Option<V> {
        let mut data = self.shard(key).write();
        let value = data.remove(key);

        if value.is_some() {
            self.decrement(1);
        }

        value
    }
}

impl<K, V> Store<K, V> for ConcurrentMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// A fresh map with the shard amount and count mode of `self`.
    fn fresh(&self, capacity: usize) -> Self {
        Self::with_options(self.options.capacity(capacity))
    }

    fn lookup(&self, key: &K) -> Option<V> {
        self.shard(key).peek(key)
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

    /// Counted entries: the size counter may have drifted far above them.
    fn size_hint(&self) -> usize {
        self.count_entries()
    }

    fn scan<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        self.for_each(f);
    }
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Copies the entries, shard by shard, into a map with the same options.
    fn clone(&self) -> Self {
        let clone = self.fresh(self.count_entries());
        self.for_each(|key, value| clone.set(key.clone(), value.clone()));
        clone
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each(|key, value| {
            map.entry(key, value);
        });
        map.finish()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for ConcurrentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

impl<K: Eq + Hash, V> Extend<(K, V)> for ConcurrentMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}
