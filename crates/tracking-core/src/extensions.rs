//! Typed extension fields carried on attributions, contexts and event properties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered extension map, flattened into the owning JSON object.
pub type Extensions = BTreeMap<String, ExtValue>;

/// Value of an extension field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtValue {
    Bool(bool),
    Number(f64),
    String(String),
    Map(Extensions),
}

impl ExtValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ExtValue {
    fn from(value: &str) -> Self {
        ExtValue::String(value.to_string())
    }
}

impl From<String> for ExtValue {
    fn from(value: String) -> Self {
        ExtValue::String(value)
    }
}

impl From<f64> for ExtValue {
    fn from(value: f64) -> Self {
        ExtValue::Number(value)
    }
}

impl From<i64> for ExtValue {
    fn from(value: i64) -> Self {
        ExtValue::Number(value as f64)
    }
}

impl From<bool> for ExtValue {
    fn from(value: bool) -> Self {
        ExtValue::Bool(value)
    }
}

/// Convert a decoded JSON value into an extension value.
///
/// Returns `None` for `null`, arrays, and objects containing either.
pub fn json_to_ext(value: serde_json::Value) -> Option<ExtValue> {
    match value {
        serde_json::Value::Bool(b) => Some(ExtValue::Bool(b)),
        serde_json::Value::Number(n) => n.as_f64().map(ExtValue::Number),
        serde_json::Value::String(s) => Some(ExtValue::String(s)),
        serde_json::Value::Object(obj) => {
            let mut map = Extensions::new();
            for (key, value) in obj {
                map.insert(key, json_to_ext(value)?);
            }
            Some(ExtValue::Map(map))
        }
        serde_json::Value::Null | serde_json::Value::Array(_) => None,
    }
}
