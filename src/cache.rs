//! # Key Cache
//!
//! Keys recovered from key servers, indexed by `(full_id, object_id)`.
//!
//! The cache only grows: entries are never evicted for the lifetime of the
//! owning client. It carries its own lock so the client can share it by
//! reference between concurrent calls.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Cache index: one key per identity per key server
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCacheKey {
    /// `{package}:{id}`
    pub full_id: String,
    /// Key server object id
    pub object_id: String,
}

impl KeyCacheKey {
    /// Build a cache key
    pub fn new(full_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            full_id: full_id.into(),
            object_id: object_id.into(),
        }
    }
}

/// Anything that can hand out a recovered key for `(full_id, object_id)`
pub trait KeySource {
    /// Key recovered from `object_id` for `full_id`, if present
    fn key_for(&self, full_id: &str, object_id: &str) -> Option<Vec<u8>>;
}

impl KeySource for HashMap<KeyCacheKey, Vec<u8>> {
    fn key_for(&self, full_id: &str, object_id: &str) -> Option<Vec<u8>> {
        self.get(&KeyCacheKey::new(full_id, object_id)).cloned()
    }
}

/// Process-lifetime store of recovered keys
#[derive(Debug, Default)]
pub struct KeyCache {
    entries: RwLock<HashMap<KeyCacheKey, Vec<u8>>>,
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a key
    pub fn insert(&self, full_id: &str, object_id: &str, key: Vec<u8>) {
        self.entries
            .write()
            .insert(KeyCacheKey::new(full_id, object_id), key);
    }

    /// Copy of the key for `(full_id, object_id)`
    pub fn get(&self, full_id: &str, object_id: &str) -> Option<Vec<u8>> {
        self.entries
            .read()
            .get(&KeyCacheKey::new(full_id, object_id))
            .cloned()
    }

    /// Whether `object_id` has a key for every id in `full_ids`
    pub fn has_all(&self, full_ids: &[String], object_id: &str) -> bool {
        let entries = self.entries.read();
        full_ids
            .iter()
            .all(|full_id| entries.contains_key(&KeyCacheKey::new(full_id.as_str(), object_id)))
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeySource for KeyCache {
    fn key_for(&self, full_id: &str, object_id: &str) -> Option<Vec<u8>> {
        self.get(full_id, object_id)
    }
}
