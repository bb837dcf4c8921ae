//! Content-type keyed body serializers and the query-parameter encoder.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// Well-known content types.
pub mod content_types {
    pub const JSON: &str = "application/json";
    pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const TEXT_HTML: &str = "text/html";
    pub const SVG: &str = "image/svg+xml";
    pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
}

/// Encodes a structured body into its wire text.
pub type BodySerializer = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Encodes a query-parameter value into a query string (without the `?`).
pub type ParamsSerializer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Maps content types to body serializers.
///
/// Populated once when the client is built and only read afterwards.
#[derive(Clone)]
pub struct SerializerRegistry {
    entries: HashMap<String, BodySerializer>,
}

impl SerializerRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `serializer` for `content_type`, replacing any previous entry.
    pub fn insert<F>(&mut self, content_type: impl Into<String>, serializer: F)
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.entries.insert(content_type.into(), Arc::new(serializer));
    }

    /// Overlay `other` on top of this registry. Entries in `other` win.
    pub fn merge(&mut self, other: SerializerRegistry) {
        self.entries.extend(other.entries);
    }

    /// Look up the serializer for an exact content type.
    pub fn get(&self, content_type: &str) -> Option<&BodySerializer> {
        self.entries.get(content_type)
    }

    /// Encode `body` as `content_type`.
    ///
    /// Fails with [`Error::MissingSerializer`] when nothing is registered.
    pub fn encode(&self, content_type: &str, body: &Value) -> Result<String> {
        let serializer = self
            .get(content_type)
            .ok_or_else(|| Error::MissingSerializer {
                content_type: content_type.to_string(),
            })?;
        serializer(body)
    }

    /// Registered content types, in no particular order.
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert(content_types::JSON, encode_json);
        registry.insert(content_types::FORM_URLENCODED, encode_form);
        registry
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.content_types().collect();
        keys.sort_unstable();
        f.debug_struct("SerializerRegistry")
            .field("content_types", &keys)
            .finish()
    }
}

/// Default `application/json` serializer.
pub fn encode_json(body: &Value) -> Result<String> {
    serde_json::to_string(body).map_err(|e| Error::Encode(e.to_string()))
}

/// Default `application/x-www-form-urlencoded` serializer.
///
/// Only objects can be form encoded; every other shape is an encode error.
pub fn encode_form(body: &Value) -> Result<String> {
    match body {
        Value::Object(_) => Ok(encode_pairs(body)),
        other => Err(Error::Encode(format!(
            "form body must be an object, got {}",
            value_kind(other)
        ))),
    }
}

/// Default query-parameter encoder: `key=value&key=value`.
///
/// Objects become one pair per key, an array of `[key, value]` pairs is
/// taken in order, a string is treated as an already-encoded query, and
/// `null` encodes to nothing.
pub fn encode_params(params: &Value) -> String {
    match params {
        Value::Null => String::new(),
        Value::String(query) => query.trim_start_matches('?').to_string(),
        other => encode_pairs(other),
    }
}

fn encode_pairs(value: &Value) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                serializer.append_pair(key, &param_string(value));
            }
        }
        Value::Array(pairs) => {
            for pair in pairs {
                if let Some([key, value]) = pair.as_array().map(Vec::as_slice) {
                    serializer.append_pair(&param_string(key), &param_string(value));
                }
            }
        }
        _ => {}
    }
    serializer.finish()
}

/// Stringify a scalar the way form encoders do: strings verbatim, arrays
/// comma-joined, everything else via its JSON text.
fn param_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(param_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
