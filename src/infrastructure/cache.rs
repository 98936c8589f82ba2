use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::StorePath;
use crate::infrastructure::subscription::Snapshot;

pub struct Cache<K, V> {
    inner: LruCache<K, V>,
}

impl<K: std::hash::Hash + Eq, V> Cache<K, V> {
    /// A zero capacity is bumped to one slot
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Cache {
            inner: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn peek(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Last known snapshot per subscribed path. Slots are written by the tasks that
/// own subscriptions; new views on a path start from its slot.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Cache<StorePath, Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Cache::new(capacity))),
        }
    }

    pub async fn store(&self, snapshot: Snapshot) {
        let mut cache = self.inner.write().await;
        cache.insert(snapshot.path.clone(), snapshot);
    }

    pub async fn latest(&self, path: &StorePath) -> Option<Snapshot> {
        let mut cache = self.inner.write().await;
        cache.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lru_eviction() {
        let mut cache: Cache<&str, i32> = Cache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get(&"a");
        cache.insert("c", 3);

        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.peek(&"b"), None);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_slots() {
        let cache = SnapshotCache::new(4);
        let path = StorePath::parse("users").unwrap();

        cache.store(Snapshot::new(path.clone(), Some(json!({"u1": {}})))).await;
        cache.store(Snapshot::new(path.clone(), Some(json!({"u2": {}})))).await;

        let latest = cache.latest(&path).await.unwrap();
        assert_eq!(latest.value, Some(json!({"u2": {}})));
        assert_eq!(cache.len().await, 1);
        assert!(cache.latest(&StorePath::parse("posts").unwrap()).await.is_none());
    }
}
