// src/query/cache.rs
// Capacity-bounded result cache with insertion-order eviction

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Entries kept before the oldest insertion is evicted
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Build a cache key that does not depend on parameter insertion order:
/// `operation:` followed by the params as JSON with every object's keys sorted.
pub fn generate_query_cache_key(operation: &str, params: &Value) -> String {
    format!("{}:{}", operation, canonicalize(params))
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(values) => Value::Array(values.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Results that can report an embedded error and so must not be cached.
///
/// For JSON objects an `error` key only counts when its value is not null,
/// so `{"data": [..], "error": null}` is a successful result.
pub trait CacheableResult {
    fn carries_error(&self) -> bool;
}

impl CacheableResult for Value {
    fn carries_error(&self) -> bool {
        self.as_object()
            .and_then(|map| map.get("error"))
            .is_some_and(|error| !error.is_null())
    }
}

impl<T: CacheableResult> CacheableResult for Option<T> {
    fn carries_error(&self) -> bool {
        self.as_ref().is_some_and(CacheableResult::carries_error)
    }
}

impl<T> CacheableResult for Vec<T> {
    fn carries_error(&self) -> bool {
        false
    }
}

/// Insertion-ordered map with a hard size cap.
///
/// When full, inserting a new key evicts the key that was inserted first.
/// Reads do not refresh an entry's position and overwriting an existing key
/// keeps its original slot, so this is FIFO and not LRU.
#[derive(Debug, Clone)]
pub struct QueryCache<R> {
    entries: IndexMap<String, R>,
    capacity: usize,
}

impl<R> Default for QueryCache<R> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl<R> QueryCache<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite, returning the evicted entry if one was dropped
    pub fn insert(&mut self, key: String, value: R) -> Option<(String, R)> {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0)
        } else {
            None
        };

        self.entries.insert(key, value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
