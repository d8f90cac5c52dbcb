//! JSON reformatting of response bodies.

use serde_json::Value;

/// How JSON bodies are rendered before being written.
///
/// Only bodies that start with `{` are touched; listings, plain leaf values
/// and HTML pages pass through unchanged, as does anything that fails to
/// parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonFormat {
    /// Minified, document key order.
    #[default]
    Compact,
    /// Keys sorted recursively, two space indent, trailing newline.
    Pretty,
}

impl JsonFormat {
    pub fn from_pretty(pretty: bool) -> Self {
        if pretty { Self::Pretty } else { Self::Compact }
    }

    pub fn apply(self, body: String) -> String {
        if !body.starts_with('{') {
            return body;
        }
        let Ok(value) = serde_json::from_str::<Value>(&body) else {
            return body;
        };

        let formatted = match self {
            Self::Compact => serde_json::to_string(&value),
            Self::Pretty => serde_json::to_string_pretty(&sort_keys(value)).map(|mut s| {
                s.push('\n');
                s
            }),
        };
        formatted.unwrap_or(body)
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
