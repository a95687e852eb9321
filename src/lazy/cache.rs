use crate::content::Content;
use dashmap::DashMap;
use moka::sync::Cache;

/// A store for materialized arrays, keyed by `VirtualArray::cache_key`.
///
/// Implementations need not evict anything, and a `get` after `set` may
/// miss. Lookups never produce values on their own.
pub trait ArrayCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Content>;

    fn set(&self, key: &str, value: Content);

    fn clear(&self);

    /// Returns the number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An unbounded in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryCache(DashMap<String, Content>);

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored keys, in no particular order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl ArrayCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Content> {
        self.0.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: Content) {
        self.0.insert(key.to_string(), value);
    }

    fn clear(&self) {
        self.0.clear();
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// A cache holding at most a fixed number of arrays, evicting the least
/// useful ones first.
pub struct BoundedCache(Cache<String, Content>);

impl BoundedCache {
    #[must_use]
    pub fn with_capacity(max_entries: u64) -> Self {
        Self(
            Cache::builder()
                .name("nestarray-virtual-cache")
                .max_capacity(max_entries)
                .build(),
        )
    }
}

impl ArrayCache for BoundedCache {
    fn get(&self, key: &str) -> Option<Content> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: Content) {
        self.0.insert(key.to_string(), value);
    }

    fn clear(&self) {
        self.0.invalidate_all();
        self.0.run_pending_tasks();
    }

    fn len(&self) -> usize {
        self.0.run_pending_tasks();
        usize::try_from(self.0.entry_count()).unwrap_or(usize::MAX)
    }
}
