//! Path resolution against a document snapshot.
//!
//! Metadata categories are addressed like a filesystem. An object becomes a
//! listing of its children (directories suffixed with `/`); anything else is
//! returned as a leaf value. A handful of objects are returned whole instead
//! of listed, because the real service serves them as JSON blobs.

use serde_json::{Map, Value};

/// Object paths (dot-joined) served as JSON rather than listed.
pub const RESERVED_PATHS: [&str; 4] = [
    "iam.info",
    "iam.security-credentials",
    "spot.instance-action",
    "events.recommendations.rebalance",
];

/// Outcome of resolving a metadata path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Newline-joined child names of an object.
    Listing(String),
    /// A value: strings unquoted, everything else as JSON text.
    Leaf(String),
    NotFound,
}

impl Resolution {
    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Listing(body) | Self::Leaf(body) => Some(body),
            Self::NotFound => None,
        }
    }
}

/// Dot-joined form of a slash-delimited path, e.g. `/iam/info/` → `iam.info`.
pub fn normalize_path(path: &str) -> String {
    trim_path(path).replace('/', ".")
}

fn trim_path(path: &str) -> &str {
    let path = path.strip_suffix('/').unwrap_or(path);
    path.strip_prefix('/').unwrap_or(path)
}

pub fn is_reserved(normalized: &str) -> bool {
    RESERVED_PATHS.contains(&normalized)
}

/// Resolve `path` against raw document bytes.
pub fn resolve(document: &[u8], path: &str) -> Resolution {
    match serde_json::from_slice::<Value>(document) {
        Ok(root) => resolve_value(&root, path),
        Err(_) => Resolution::NotFound,
    }
}

/// Resolve `path` against a parsed document.
pub fn resolve_value(root: &Value, path: &str) -> Resolution {
    let trimmed = trim_path(path);
    if trimmed.is_empty() {
        return match root {
            Value::Object(map) => Resolution::Listing(list_children(map)),
            _ => Resolution::NotFound,
        };
    }

    let mut current = root;
    for segment in trimmed.split('/') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Resolution::NotFound,
        }
    }

    match current {
        Value::Object(map) if !is_reserved(&normalize_path(trimmed)) => {
            Resolution::Listing(list_children(map))
        }
        Value::String(s) => Resolution::Leaf(s.clone()),
        other => Resolution::Leaf(other.to_string()),
    }
}

fn list_children(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(key, value)| {
            if value.is_object() {
                format!("{key}/")
            } else {
                key.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
