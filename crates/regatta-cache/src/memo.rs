//! In-process memoization store for parsed remote responses.
//!
//! The store deliberately has no per-entry eviction: one expiry horizon
//! covers every key. Crossing the horizon on any lookup drops the whole
//! backing map and starts a fresh window. Entries are JSON values and are
//! treated as immutable once written, so concurrent last-write-wins `set`
//! calls are harmless.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use serde_json::Value;
use tracing::debug;

/// Default lifetime of the whole store.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

struct Store {
    horizon: Instant,
    entries: HashMap<String, Value>,
}

/// A memoization cache with a single whole-store expiry horizon.
///
/// Lookups (`has`/`get`) first run an implicit expiry check; `set` does not.
/// Expiry is observable only through subsequent misses. The store is
/// internally synchronized, so one instance can be shared across requests
/// behind an `Arc`.
pub struct MemoCache {
    ttl: Duration,
    store: Mutex<Store>,
}

impl MemoCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            store: Mutex::new(Store {
                horizon: Instant::now() + ttl,
                entries: HashMap::new(),
            }),
        }
    }

    /// Returns whether `key` is present in the current window.
    pub fn has(&self, key: &str) -> bool {
        self.fresh_store().entries.contains_key(key)
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.fresh_store().entries.get(key).cloned()
    }

    /// Returns the value stored under `key`, or `default` on a miss.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Stores `value` under `key`. Returns `&self` for chaining.
    pub fn set(&self, key: impl Into<String>, value: Value) -> &Self {
        self.store.lock().unwrap().entries.insert(key.into(), value);
        self
    }

    fn fresh_store(&self) -> MutexGuard<'_, Store> {
        let mut store = self.store.lock().unwrap();
        let now = Instant::now();

        if now > store.horizon {
            store.entries = HashMap::new();
            store.horizon = now + self.ttl;
            debug!("memo cache expired, store dropped");
        }

        store
    }
}

impl Default for MemoCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_set_then_get() {
        let cache = MemoCache::default();
        cache.set("k", json!({"a": 1}));

        assert!(cache.has("k"));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_get_or_returns_default_on_miss() {
        let cache = MemoCache::default();
        assert_eq!(cache.get_or("missing", json!([])), json!([]));
    }

    #[test]
    fn test_set_overwrites() {
        let cache = MemoCache::default();
        cache.set("k", json!(1)).set("k", json!(2));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn test_expiry_drops_whole_store() {
        let cache = MemoCache::new(Duration::from_millis(20));
        cache.set("a", json!("first"));
        cache.set("b", json!("second"));

        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert!(!cache.has("b"));

        // a fresh window accepts writes again
        cache.set("a", json!("third"));
        assert_eq!(cache.get("a"), Some(json!("third")));
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = std::sync::Arc::new(MemoCache::default());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || {
                    cache.set(format!("key-{i}"), json!(i));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..4 {
            assert_eq!(cache.get(&format!("key-{i}")), Some(json!(i)));
        }
    }
}
