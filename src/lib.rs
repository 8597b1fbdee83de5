//! Thread-safe key/value containers.
//!
//! Two interchangeable containers share one operation set:
//!
//! -   [`LockedMap`]: a `HashMap` behind a single reader/writer lock. Exact
//!     size, every operation linearizable.
//! -   [`ConcurrentMap`]: independently locked shards and an atomic size
//!     counter. Operations on disjoint keys rarely contend, but whole-map
//!     operations are best-effort scans and the counter is approximate by
//!     default, see [`CountMode`].
//!
//! Both implement [`Store`], and thereby the [`Functional`] transformations
//! (map, filter, partition, sort) which always return fresh containers.
//!
//! Absent keys read as `V::default()`; `get_checked` also reports presence.
//!
//! ```
//! use syncmap::{ConcurrentMap, Functional};
//!
//! let map = ConcurrentMap::new();
//! map.set("pi", 3.14159);
//! map.set("e", 2.71828);
//! map.set("phi", 1.61803);
//!
//! let (high, low) = map.partition_value(|value| *value > 2.5);
//! assert!(high.contains_key(&"pi"));
//! assert!(high.contains_key(&"e"));
//! assert_eq!((1.61803, true), low.get_checked(&"phi"));
//!
//! assert_eq!(0.0, map.get(&"tau"));
//! assert_eq!((0.0, false), map.get_checked(&"tau"));
//! ```

macro_rules! vec_no_clone {
    ( $val:expr; $n:expr ) => {{
        let result: Vec<_> = std::iter::repeat_with(|| $val).take($n).collect();
        result
    }};
}

mod concurrent;
mod functional;
mod locked;
mod options;
mod store;

#[cfg(test)]
mod tester;

pub use concurrent::ConcurrentMap;
pub use functional::Functional;
pub use locked::LockedMap;
pub use options::{CountMode, Options, MAX_SHARDS, NUM_SHARDS};
pub use store::Store;
