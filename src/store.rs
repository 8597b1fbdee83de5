/// The capability set shared by the containers.
///
/// Implemented by [`LockedMap`](crate::LockedMap) and
/// [`ConcurrentMap`](crate::ConcurrentMap); [`Functional`](crate::Functional)
/// is written once against it.
///
/// All methods take `&self`: implementors synchronize internally.
pub trait Store<K, V> {
    /// Creates an empty container configured like `self`, pre-sized for
    /// `capacity` entries.
    ///
    /// The new container shares no storage, and no lock, with `self`.
    fn fresh(&self, capacity: usize) -> Self
    where
        Self: Sized;

    /// Returns a copy of the value associated to `key`, if any.
    fn lookup(&self, key: &K) -> Option<V>;

    /// Associates `value` to `key`, overwriting any previous value.
    fn insert(&self, key: K, value: V);

    /// Removes `key`, returning its value if it was present.
    fn remove(&self, key: &K) -> Option<V>;

    /// Number of entries, as reported by the container.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries to pre-allocate for when copying out of `self`.
    ///
    /// Defaults to [`Store::len`].
    fn size_hint(&self) -> usize {
        self.len()
    }

    /// Calls `f` on every entry.
    ///
    /// #   Deadlocks
    ///
    /// `f` must not access the container being scanned.
    fn scan<F>(&self, f: F)
    where
        F: FnMut(&K, &V);
}
