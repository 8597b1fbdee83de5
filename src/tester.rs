//! Internal testing utilities

use std::collections::HashSet;

use crate::store::Store;

pub const PI: f64 = 3.14159;
pub const E: f64 = 2.71828;
pub const PHI: f64 = 1.61803;

//  Installs `env_logger` once; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

//  Fills `store` with a handful of mathematical constants.
pub fn constants<S: Store<String, f64>>(store: S) -> S {
    store.insert("pi".to_string(), PI);
    store.insert("e".to_string(), E);
    store.insert("phi".to_string(), PHI);
    store
}

pub fn hash_set(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|key| key.to_string()).collect()
}
