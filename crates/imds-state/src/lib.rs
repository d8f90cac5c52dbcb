//! imds-state — the metadata document engine.
//!
//! Serves an EC2 instance metadata document from memory and lets it change
//! at runtime to simulate lifecycle events.
//!
//! # Architecture
//!
//! ```text
//! DocumentStore (RwLock<Arc<[u8]>>)
//!   ├── snapshot()      shared, never observes a half-applied patch
//!   └── apply_patch()   exclusive, all-or-nothing
//! PatchPipeline
//!   └── [InstanceTag, Spot] applied in order at startup
//! resolve(snapshot, path) → Listing | Leaf | NotFound
//! ResponseCache (RwLock<HashMap>) keyed by request path
//! ```
//!
//! The store and the cache each own an independent lock. A mutation
//! followed by cache invalidation is therefore two critical sections,
//! which leaves a short window where stale (but never torn) cached bodies
//! can still be served.

pub mod cache;
pub mod document;
pub mod error;
pub mod patch;
pub mod resolver;

pub use cache::ResponseCache;
pub use document::{DocumentStore, ON_DEMAND_SEED};
pub use error::{StateError, StateResult};
pub use patch::{JsonPatchOp, PatchOperation, PatchPipeline};
pub use resolver::{RESERVED_PATHS, Resolution, resolve};
