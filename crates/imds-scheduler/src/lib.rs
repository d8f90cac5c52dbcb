//! imds-scheduler — runtime lifecycle events for the metadata mock.
//!
//! A spot interruption can be raised some time after the mock starts,
//! mirroring how a real instance only sees `spot/instance-action` once AWS
//! decides to reclaim it.
//!
//! # Architecture
//!
//! ```text
//! LifecycleScheduler::arm(event)
//!   └── tokio task: sleep(delay)
//!       ├── DocumentStore::apply_patch(Spot { action })
//!       └── ResponseCache eviction (root listing + patched categories)
//! ```
//!
//! The task contends for the store and cache locks exactly like a request
//! handler does. Nothing awaits it, so a failed patch is logged and dropped.

pub mod lifecycle;

pub use lifecycle::{INVALIDATED_PATHS, LifecycleScheduler};
