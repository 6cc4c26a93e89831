use dashmap::DashMap;
use std::sync::Arc;

/// In-process read-through cache of persisted records keyed by id.
///
/// Cloning shares the underlying map. Evicting never touches storage.
#[derive(Clone)]
pub struct EntityCache<T> {
    name: &'static str,
    entries: Arc<DashMap<i64, T>>,
}

impl<T: Clone> EntityCache<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, id: i64) -> Option<T> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn put(&self, id: i64, value: T) {
        self.entries.insert(id, value);
    }

    pub fn evict(&self, id: i64) {
        self.entries.remove(&id);
    }

    pub fn evict_all(&self) {
        let evicted = self.entries.len();
        self.entries.clear();
        tracing::info!(cache = self.name, evicted, "Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_evict() {
        let cache = EntityCache::new("greetings");
        cache.put(1, "hello".to_string());
        cache.put(2, "hola".to_string());

        assert_eq!(cache.get(1).as_deref(), Some("hello"));
        assert_eq!(cache.len(), 2);

        cache.evict(1);
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(2).as_deref(), Some("hola"));
    }

    #[test]
    fn clones_share_entries() {
        let cache = EntityCache::new("greetings");
        let other = cache.clone();
        cache.put(1, 10);

        assert_eq!(other.get(1), Some(10));

        other.evict_all();
        assert!(cache.is_empty());
        assert_eq!(cache.name(), "greetings");
    }
}
