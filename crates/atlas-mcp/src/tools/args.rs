//! Tool argument decoding.

use atlas_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode an argument map into a typed parameter struct.
pub fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args)).map_err(|e| Error::InvalidInput(e.to_string()))
}

/// Accept a JSON object given either directly or as a JSON string.
pub fn object_arg(name: &str, raw: Option<Value>) -> Result<Map<String, Value>> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(text)) => match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(Error::InvalidInput(format!("{} must be a JSON object", name))),
        },
        Some(_) => Err(Error::InvalidInput(format!("{} must be a JSON object", name))),
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn comma_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}
