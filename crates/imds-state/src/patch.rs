//! Patches that reshape the metadata document.
//!
//! Each [`PatchOperation`] expands into a fixed list of RFC 6902 style
//! operations ([`JsonPatchOp`]) which are applied in order to a parsed copy
//! of the document. Only `add` and `replace` are supported, which is all
//! the two patches ever produce.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use imds_core::{ImdsConfig, SpotAction};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::document::DocumentStore;
use crate::error::{StateError, StateResult};

/// Advance notice given before a spot interruption (except hibernation).
pub const SPOT_NOTICE_LEAD_SECS: i64 = 120;

/// A single JSON-Patch operation.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPatchOp {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
}

impl JsonPatchOp {
    pub fn add(path: &str, value: Value) -> Self {
        Self::Add {
            path: path.to_string(),
            value,
        }
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self::Replace {
            path: path.to_string(),
            value,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. } | Self::Replace { path, .. } => path,
        }
    }

    /// Apply to `document` in place.
    pub fn apply(&self, document: &mut Value) -> StateResult<()> {
        let (parent, key) = split_pointer(self.path())?;
        let target = document.pointer_mut(parent).ok_or_else(|| {
            StateError::MalformedDocument(format!("parent of {} does not exist", self.path()))
        })?;

        match (self, target) {
            (Self::Add { value, .. }, Value::Object(map)) => {
                map.insert(key, value.clone());
                Ok(())
            }
            (Self::Replace { value, .. }, Value::Object(map)) => match map.get_mut(&key) {
                Some(slot) => {
                    *slot = value.clone();
                    Ok(())
                }
                None => Err(StateError::MalformedDocument(format!(
                    "cannot replace missing member {}",
                    self.path()
                ))),
            },
            (Self::Add { value, .. }, Value::Array(items)) => {
                let index = if key == "-" {
                    items.len()
                } else {
                    array_index(&key, items.len() + 1, self.path())?
                };
                items.insert(index, value.clone());
                Ok(())
            }
            (Self::Replace { value, .. }, Value::Array(items)) => {
                let index = array_index(&key, items.len(), self.path())?;
                items[index] = value.clone();
                Ok(())
            }
            _ => Err(StateError::MalformedDocument(format!(
                "parent of {} is not a container",
                self.path()
            ))),
        }
    }
}

/// Split a JSON pointer into its parent pointer and unescaped final token.
fn split_pointer(path: &str) -> StateResult<(&str, String)> {
    let (parent, token) = path
        .rsplit_once('/')
        .ok_or_else(|| StateError::MalformedDocument(format!("invalid pointer {path:?}")))?;
    Ok((parent, token.replace("~1", "/").replace("~0", "~")))
}

fn array_index(token: &str, bound: usize, path: &str) -> StateResult<usize> {
    token
        .parse::<usize>()
        .ok()
        .filter(|i| *i < bound)
        .ok_or_else(|| StateError::MalformedDocument(format!("index out of bounds at {path}")))
}

/// A named transformation of the metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    /// Expose instance tags under `tags/instance`. No-op without tags.
    InstanceTag { tags: BTreeMap<String, String> },
    /// Turn the instance into a spot instance with a pending interruption.
    Spot { action: SpotAction },
}

impl PatchOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstanceTag { .. } => "instance-tag",
            Self::Spot { .. } => "spot",
        }
    }

    /// The JSON-Patch operations this patch expands to at time `now`.
    pub fn operations_at(&self, now: DateTime<Utc>) -> Vec<JsonPatchOp> {
        match self {
            Self::InstanceTag { tags } if tags.is_empty() => Vec::new(),
            Self::InstanceTag { tags } => {
                let instance: Map<String, Value> = tags
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                vec![JsonPatchOp::add("/tags", json!({ "instance": Value::Object(instance) }))]
            }
            Self::Spot { action } => spot_operations(*action, now),
        }
    }

    /// JSON pointers of the members this patch writes.
    pub fn touched_paths(&self) -> Vec<String> {
        self.operations_at(Utc::now())
            .iter()
            .map(|op| op.path().to_string())
            .collect()
    }

    /// Apply this patch to `document`, returning the patched bytes.
    pub fn apply(&self, document: &[u8]) -> StateResult<Vec<u8>> {
        self.apply_at(document, Utc::now())
    }

    pub fn apply_at(&self, document: &[u8], now: DateTime<Utc>) -> StateResult<Vec<u8>> {
        let operations = self.operations_at(now);
        if operations.is_empty() {
            return Ok(document.to_vec());
        }

        let mut value: Value = serde_json::from_slice(document)
            .map_err(|e| StateError::MalformedDocument(e.to_string()))?;
        for op in &operations {
            op.apply(&mut value)?;
        }

        serde_json::to_vec(&value).map_err(|e| StateError::MalformedDocument(e.to_string()))
    }
}

fn spot_operations(action: SpotAction, now: DateTime<Utc>) -> Vec<JsonPatchOp> {
    let at = match action {
        SpotAction::Hibernate => now,
        SpotAction::Terminate | SpotAction::Stop => now + TimeDelta::seconds(SPOT_NOTICE_LEAD_SECS),
    };
    let at = at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut spot = json!({
        "instance-action": {
            "action": action.as_str(),
            "time": at,
        }
    });
    if action == SpotAction::Terminate {
        spot["termination-time"] = Value::String(at.clone());
    }

    vec![
        JsonPatchOp::replace("/instance-life-cycle", json!("spot")),
        JsonPatchOp::add("/spot", spot),
        JsonPatchOp::add(
            "/events/recommendations",
            json!({ "rebalance": { "noticeTime": at } }),
        ),
    ]
}

/// Ordered patches applied to the document at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchPipeline {
    operations: Vec<PatchOperation>,
}

impl PatchPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, op: PatchOperation) -> Self {
        self.operations.push(op);
        self
    }

    /// Startup patches for `config`: instance tags first, then an immediate
    /// spot interruption. Delayed interruptions belong to the scheduler.
    pub fn from_config(config: &ImdsConfig) -> Self {
        let mut pipeline = Self::new();
        if !config.exclude_instance_tags {
            pipeline = pipeline.with(PatchOperation::InstanceTag {
                tags: config.instance_tags.clone(),
            });
        }
        if config.simulate_spot && config.spot_action.is_immediate() {
            pipeline = pipeline.with(PatchOperation::Spot {
                action: config.spot_action.action,
            });
        }
        pipeline
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    /// Apply every patch in order, stopping at the first failure.
    pub fn run(&self, store: &DocumentStore) -> StateResult<()> {
        for op in &self.operations {
            store.apply_patch(op)?;
            debug!(patch = op.name(), "startup patch applied");
        }
        Ok(())
    }
}
