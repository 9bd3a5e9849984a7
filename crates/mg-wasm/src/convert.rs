//! JsValue <-> JSON helpers.

use std::fmt::Display;

use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub(crate) fn js_error(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Message of a thrown JS value.
pub(crate) fn error_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

pub(crate) fn to_json(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text = String::from(js_sys::JSON::stringify(value)?);
    serde_json::from_str(&text).map_err(js_error)
}

/// A JS object as a JSON map. `undefined` and `null` give an empty map.
pub(crate) fn to_map(value: &JsValue) -> Result<Map<String, Value>, JsValue> {
    match to_json(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(JsValue::from_str(&format!("expected an object, got {}", other))),
    }
}

pub(crate) fn from_json(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

/// Flatten a `chrome.storage.onChanged` payload into `key -> new value`.
///
/// Entries of the form `{ oldValue, newValue }` become their `newValue`; a
/// change that carries only `oldValue` is a removal and becomes `null`.
/// Anything else is taken as the new value itself.
pub fn flatten_storage_changes(changes: Map<String, Value>) -> Map<String, Value> {
    changes
        .into_iter()
        .map(|(key, change)| {
            let value = match change {
                Value::Object(mut entry) if entry.contains_key("newValue") || entry.contains_key("oldValue") => {
                    entry.remove("newValue").unwrap_or(Value::Null)
                }
                other => other,
            };
            (key, value)
        })
        .collect()
}
