//! The session-scoped result store.
//!
//! A session owns two of these: one mapping query keys to result lists and
//! one mapping callable-statement keys to the output-parameter values they
//! produced. While a query runs, its key holds [`CacheEntry::InFlight`] so a
//! nested execution of the same query on the same call stack can tell "being
//! computed" apart from both "absent" and "done".

use std::collections::HashMap;

use crate::cache_key::CacheKey;

/// What a key maps to.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry<V> {
    /// Execution for this key has started and not yet finished.
    InFlight,
    /// A completed result.
    Value(V),
}

/// Result of [`LocalCache::lookup`].
#[derive(Debug, PartialEq)]
pub enum Lookup<'a, V> {
    Absent,
    InFlight,
    Value(&'a V),
}

/// An unbounded key/value store cleared wholesale by the session.
#[derive(Debug)]
pub struct LocalCache<V> {
    id: &'static str,
    entries: HashMap<CacheKey, CacheEntry<V>>,
}

impl<V> LocalCache<V> {
    /// Create an empty cache; `id` only appears in logs.
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            entries: HashMap::new(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Classify `key`.
    pub fn lookup(&self, key: &CacheKey) -> Lookup<'_, V> {
        match self.entries.get(key) {
            None => Lookup::Absent,
            Some(CacheEntry::InFlight) => Lookup::InFlight,
            Some(CacheEntry::Value(v)) => Lookup::Value(v),
        }
    }

    /// The completed value at `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<&V> {
        match self.entries.get(key) {
            Some(CacheEntry::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Whether `key` holds anything, in flight or completed.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a completed value, replacing whatever `key` held.
    pub fn put(&mut self, key: CacheKey, value: V) {
        self.entries.insert(key, CacheEntry::Value(value));
    }

    /// Mark `key` as being computed.
    pub fn put_in_flight(&mut self, key: CacheKey) {
        self.entries.insert(key, CacheEntry::InFlight);
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::trace!(
                target: "sqlmapper::cache",
                cache = self.id,
                entries = self.entries.len(),
                "clearing local cache"
            );
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
