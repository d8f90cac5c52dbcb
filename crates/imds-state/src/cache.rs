//! In-memory response cache keyed by request path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Thread-safe map of request path to response body.
#[derive(Clone, Default)]
pub struct ResponseCache {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    /// Store `value` under `key`, overwriting any previous entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.items.write().insert(key.into(), value.into());
    }

    /// Returns true if the key was cached.
    pub fn remove(&self, key: &str) -> bool {
        self.items.write().remove(key).is_some()
    }

    /// Evict several keys under one lock. Returns how many were cached.
    pub fn remove_all(&self, keys: &[&str]) -> usize {
        let mut items = self.items.write();
        keys.iter().filter(|key| items.remove(**key).is_some()).count()
    }

    /// Evict every key matching `predicate`. Returns how many were evicted.
    pub fn remove_matching(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|key, _| !predicate(key));
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn get_miss() {
        let cache = ResponseCache::new();
        assert_eq!(cache.get("/latest/meta-data"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_then_get_overwrites() {
        let cache = ResponseCache::new();
        cache.set("/a", "one");
        cache.set("/a", "two");
        assert_eq!(cache.get("/a").as_deref(), Some("two"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_and_remove_all() {
        let cache = ResponseCache::new();
        cache.set("/latest/meta-data", "root");
        cache.set("/latest/meta-data/", "root");
        cache.set("/latest/meta-data/ami-id", "ami");

        assert!(cache.remove("/latest/meta-data/ami-id"));
        assert!(!cache.remove("/latest/meta-data/ami-id"));

        let evicted = cache.remove_all(&["/latest/meta-data", "/latest/meta-data/", "/other"]);
        assert_eq!(evicted, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_matching_evicts_by_predicate() {
        let cache = ResponseCache::new();
        cache.set("/latest/meta-data/events", "maintenance/");
        cache.set("/latest/meta-data/events/maintenance", "history\nscheduled");
        cache.set("/latest/meta-data/ami-id", "ami");

        let evicted = cache.remove_matching(|key| key.starts_with("/latest/meta-data/events"));
        assert_eq!(evicted, 2);
        assert_eq!(cache.get("/latest/meta-data/ami-id").as_deref(), Some("ami"));
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResponseCache::new();
        let writer = cache.clone();
        thread::spawn(move || writer.set("/shared", "value"))
            .join()
            .unwrap();
        assert_eq!(cache.get("/shared").as_deref(), Some("value"));
    }
}
