/// Default amount of shards of a [`ConcurrentMap`](crate::ConcurrentMap).
pub const NUM_SHARDS: usize = 64;

/// Upper bound on the amount of shards of a [`ConcurrentMap`](crate::ConcurrentMap).
pub const MAX_SHARDS: usize = 1 << 16;

/// How a [`ConcurrentMap`](crate::ConcurrentMap) maintains its size counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountMode {
    /// Every `set` increments the counter, overwrites included.
    ///
    /// Repeatedly overwriting the same keys inflates `size()` above the
    /// number of distinct keys. This is the default.
    Approximate,
    /// `set` increments the counter only when the key was not present.
    ///
    /// The decision is taken under the shard lock, so once writers are
    /// quiescent `size()` equals the number of entries.
    Exact,
}

impl Default for CountMode {
    fn default() -> Self {
        CountMode::Approximate
    }
}

/// Construction options.
///
/// ```
/// use syncmap::{ConcurrentMap, CountMode, Options};
///
/// let options = Options::new().capacity(1024).shards(16).count_mode(CountMode::Exact);
/// let map: ConcurrentMap<u32, u32> = ConcurrentMap::with_options(options);
///
/// assert!(map.is_empty());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Options {
    capacity: usize,
    shards: usize,
    count_mode: CountMode,
}

impl Options {
    pub const fn new() -> Self {
        Self {
            capacity: 0,
            shards: NUM_SHARDS,
            count_mode: CountMode::Approximate,
        }
    }

    /// Pre-allocation hint, spread evenly over the shards. Never affects
    /// correctness.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Amount of shards, clamped to `1..=MAX_SHARDS` and rounded up to the
    /// next power of two.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards.clamp(1, MAX_SHARDS).next_power_of_two();
        self
    }

    pub fn count_mode(mut self, count_mode: CountMode) -> Self {
        self.count_mode = count_mode;
        self
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_shards(&self) -> usize {
        self.shards
    }

    pub fn get_count_mode(&self) -> CountMode {
        self.count_mode
    }

    //  Capacity hint of a single shard.
    pub(crate) fn shard_capacity(&self) -> usize {
        let rounded = self.capacity % self.shards != 0;
        self.capacity / self.shards + rounded as usize
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
