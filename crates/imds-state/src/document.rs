//! The single, mutable metadata document.
//!
//! Readers take a cheap `Arc` snapshot under a shared lock; patches swap in
//! a freshly built buffer under the exclusive lock. A failed patch leaves the
//! previous buffer in place.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::patch::PatchOperation;

/// Metadata for an on-demand instance, served until patched.
pub const ON_DEMAND_SEED: &[u8] = include_bytes!("seed/on-demand.json");

/// Thread-safe handle to the metadata document.
#[derive(Clone)]
pub struct DocumentStore {
    data: Arc<RwLock<Arc<[u8]>>>,
}

impl DocumentStore {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: Arc::new(RwLock::new(bytes.into())),
        }
    }

    /// A store holding the embedded on-demand instance document.
    pub fn seeded() -> Self {
        Self::new(ON_DEMAND_SEED)
    }

    /// The current document bytes. Safe to read without further locking.
    pub fn snapshot(&self) -> Arc<[u8]> {
        self.data.read().clone()
    }

    /// The current document, parsed.
    pub fn document(&self) -> StateResult<Value> {
        let snapshot = self.snapshot();
        serde_json::from_slice(&snapshot).map_err(|e| StateError::MalformedDocument(e.to_string()))
    }

    /// Apply `op` while holding the exclusive lock.
    pub fn apply_patch(&self, op: &PatchOperation) -> StateResult<()> {
        let mut data = self.data.write();
        let current: &[u8] = &data;
        let patched = op.apply(current)?;
        *data = patched.into();
        debug!(patch = op.name(), bytes = data.len(), "document patched");
        Ok(())
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use imds_core::SpotAction;

    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn seeded_store_parses() {
        let store = DocumentStore::seeded();
        let doc = store.document().unwrap();
        assert_eq!(doc["ami-id"], "ami-0e34bbddc66def5ac");
        assert_eq!(doc["instance-life-cycle"], "on-demand");
        assert!(doc.get("spot").is_none());
    }

    #[test]
    fn snapshot_outlives_patch() {
        let store = DocumentStore::new(&b"{}"[..]);
        let before = store.snapshot();

        store
            .apply_patch(&PatchOperation::InstanceTag {
                tags: tags(&[("Name", "x")]),
            })
            .unwrap();

        assert_eq!(&*before, b"{}");
        assert_eq!(store.document().unwrap()["tags"]["instance"]["Name"], "x");
    }

    #[test]
    fn failed_patch_retains_prior_state() {
        let store = DocumentStore::new(&b"{"[..]);
        let err = store
            .apply_patch(&PatchOperation::Spot {
                action: SpotAction::Stop,
            })
            .unwrap_err();

        assert!(matches!(err, StateError::MalformedDocument(_)));
        assert_eq!(&*store.snapshot(), b"{");
    }

    #[test]
    fn failed_patch_on_missing_target_retains_prior_state() {
        // `replace` needs an existing instance-life-cycle member.
        let store = DocumentStore::new(&br#"{"events":{}}"#[..]);
        assert!(
            store
                .apply_patch(&PatchOperation::Spot {
                    action: SpotAction::Terminate,
                })
                .is_err()
        );
        assert_eq!(&*store.snapshot(), br#"{"events":{}}"#);
    }

    #[test]
    fn concurrent_readers_never_see_partial_writes() {
        let store = DocumentStore::seeded();
        let seed_len = store.snapshot().len();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = store.snapshot();
                        let doc: Value = serde_json::from_slice(&snapshot).unwrap();
                        let tagged = doc.get("tags").is_some();
                        assert_eq!(tagged, snapshot.len() != seed_len);
                    }
                })
            })
            .collect();

        store
            .apply_patch(&PatchOperation::InstanceTag {
                tags: tags(&[("Name", "concurrent")]),
            })
            .unwrap();

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.document().unwrap()["tags"]["instance"]["Name"], "concurrent");
    }
}
