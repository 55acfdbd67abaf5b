//! LRU-bounded key/value cache.

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use tracing::debug;

/// Cache kind for user profiles (`profile_<id>`).
pub const PROFILE_KIND: &str = "profile";

/// Key/value cache keyed by strings of the form `<kind>_<identity>`.
pub struct Cache {
    entries: Mutex<LruCache<String, Value>>,
}

impl Cache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Build the key for a kind of entry belonging to an identity.
    pub fn key_for(kind: &str, identity_id: &str) -> String {
        format!("{}_{}", kind, identity_id)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.entries.lock().put(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.lock().pop(key)
    }

    /// Drop every entry keyed by `identity_id`. Returns how many were removed.
    pub fn invalidate_identity(&self, identity_id: &str) -> usize {
        let suffix = format!("_{}", identity_id);
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.ends_with(&suffix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        if !doomed.is_empty() {
            debug!(user = identity_id, removed = doomed.len(), "cache entries invalidated");
        }
        doomed.len()
    }

    /// Empty the cache.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
