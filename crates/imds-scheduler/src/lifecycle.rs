//! One-shot spot interruption scheduling.

use imds_core::routes::{METADATA_PATH, category_path};
use imds_core::{SpotAction, SpotActionEvent};
use imds_state::{DocumentStore, PatchOperation, ResponseCache, StateResult};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Cache keys always evicted after a scheduled patch.
pub const INVALIDATED_PATHS: [&str; 2] = [METADATA_PATH, "/latest/meta-data/"];

/// Raises delayed spot interruptions against a shared document.
#[derive(Clone)]
pub struct LifecycleScheduler {
    store: DocumentStore,
    cache: ResponseCache,
}

impl LifecycleScheduler {
    pub fn new(store: DocumentStore, cache: ResponseCache) -> Self {
        Self { store, cache }
    }

    /// Schedule `event` to fire once after its delay.
    ///
    /// Returns `None` for a zero delay: immediate interruptions are applied
    /// by the startup patch pipeline instead. The returned handle can be
    /// aborted to cancel the event before it fires.
    pub fn arm(&self, event: SpotActionEvent) -> Option<JoinHandle<()>> {
        if event.is_immediate() {
            debug!(action = %event.action, "immediate spot action, nothing to schedule");
            return None;
        }

        info!(action = %event.action, delay = ?event.delay, "spot interruption scheduled");
        let scheduler = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(event.delay).await;
            match scheduler.fire(event.action) {
                Ok(evicted) => {
                    info!(action = %event.action, evicted, "spot interruption raised");
                }
                Err(e) => {
                    error!(action = %event.action, error = %e, "scheduled spot patch failed");
                }
            }
        }))
    }

    /// Apply the spot patch now and evict affected cache entries.
    ///
    /// Evicts the root listing plus any cached path on, above, or below a
    /// member the patch wrote. Returns the number of evicted entries. On
    /// failure the cache is left untouched.
    pub fn fire(&self, action: SpotAction) -> StateResult<usize> {
        let patch = PatchOperation::Spot { action };
        self.store.apply_patch(&patch)?;

        let touched = patch.touched_paths();
        let evicted = self.cache.remove_all(&INVALIDATED_PATHS)
            + self.cache.remove_matching(|key| is_affected(key, &touched));
        Ok(evicted)
    }
}

/// Whether a cached request path overlaps one of the patched pointers.
fn is_affected(key: &str, touched: &[String]) -> bool {
    let Some(category) = category_path(key) else {
        return false;
    };
    let category = category.strip_suffix('/').unwrap_or(category);
    if category.is_empty() {
        return true;
    }

    touched.iter().any(|pointer| {
        pointer == category
            || pointer.starts_with(&format!("{category}/"))
            || category.starts_with(&format!("{pointer}/"))
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use imds_state::{Resolution, resolve};

    use super::*;

    fn scheduler() -> (LifecycleScheduler, DocumentStore, ResponseCache) {
        let store = DocumentStore::seeded();
        let cache = ResponseCache::new();
        (
            LifecycleScheduler::new(store.clone(), cache.clone()),
            store,
            cache,
        )
    }

    #[tokio::test]
    async fn zero_delay_is_not_scheduled() {
        let (scheduler, store, _) = scheduler();
        let event = SpotActionEvent::new(SpotAction::Terminate, Duration::ZERO);
        assert!(scheduler.arm(event).is_none());
        assert_eq!(store.document().unwrap()["instance-life-cycle"], "on-demand");
    }

    #[tokio::test]
    async fn fires_once_after_delay() {
        let (scheduler, store, cache) = scheduler();
        cache.set("/latest/meta-data", "stale");
        cache.set("/latest/meta-data/", "stale");
        cache.set("/latest/meta-data/ami-id", "ami-0e34bbddc66def5ac");

        let handle = scheduler
            .arm(SpotActionEvent::new(SpotAction::Stop, Duration::from_millis(50)))
            .unwrap();

        assert_eq!(
            resolve(&store.snapshot(), "/spot/instance-action"),
            Resolution::NotFound
        );

        handle.await.unwrap();

        let doc = store.document().unwrap();
        assert_eq!(doc["spot"]["instance-action"]["action"], "stop");
        assert_eq!(cache.get("/latest/meta-data"), None);
        assert_eq!(cache.get("/latest/meta-data/"), None);
        assert_eq!(
            cache.get("/latest/meta-data/ami-id").as_deref(),
            Some("ami-0e34bbddc66def5ac")
        );
    }

    #[tokio::test]
    async fn cancelled_event_never_fires() {
        let (scheduler, store, _) = scheduler();
        let handle = scheduler
            .arm(SpotActionEvent::new(SpotAction::Terminate, Duration::from_secs(30)))
            .unwrap();

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(store.document().unwrap().get("spot").is_none());
    }

    #[tokio::test]
    async fn failed_patch_is_swallowed() {
        let store = DocumentStore::new(&b"{"[..]);
        let cache = ResponseCache::new();
        cache.set("/latest/meta-data", "root");
        let scheduler = LifecycleScheduler::new(store.clone(), cache.clone());

        let handle = scheduler
            .arm(SpotActionEvent::new(SpotAction::Hibernate, Duration::from_millis(10)))
            .unwrap();
        handle.await.unwrap();

        assert_eq!(&*store.snapshot(), b"{");
        assert_eq!(cache.get("/latest/meta-data").as_deref(), Some("root"));
    }

    #[test]
    fn fire_evicts_patched_categories() {
        let (scheduler, _, cache) = scheduler();
        for key in [
            "/latest/meta-data/events",
            "/latest/meta-data/events/",
            "/latest/meta-data/instance-life-cycle",
            "/latest/meta-data/placement/region",
            "/latest/api/token",
        ] {
            cache.set(key, "cached");
        }

        let evicted = scheduler.fire(SpotAction::Terminate).unwrap();
        assert_eq!(evicted, 3);
        assert_eq!(cache.get("/latest/meta-data/events"), None);
        assert_eq!(cache.get("/latest/meta-data/instance-life-cycle"), None);
        assert!(cache.get("/latest/meta-data/placement/region").is_some());
        assert!(cache.get("/latest/api/token").is_some());
    }

    #[test]
    fn affected_paths() {
        let touched = vec!["/spot".to_string(), "/events/recommendations".to_string()];
        assert!(is_affected("/latest/meta-data", &touched));
        assert!(is_affected("/latest/meta-data/", &touched));
        assert!(is_affected("/latest/meta-data/events", &touched));
        assert!(is_affected("/latest/meta-data/spot/instance-action", &touched));
        assert!(is_affected("/latest/meta-data/events/recommendations/rebalance", &touched));
        assert!(!is_affected("/latest/meta-data/events/maintenance", &touched));
        assert!(!is_affected("/latest/meta-data/spotty", &touched));
        assert!(!is_affected("/elsewhere/spot", &touched));
    }
}
