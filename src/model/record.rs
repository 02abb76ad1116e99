//! Lenient readers for store representations.
//!
//! The store is not strict about numeric encodings (`"3"` and `3` both show
//! up for integer fields, prices come back as strings or numbers), so every
//! reader accepts both forms.

use crate::core::{RemoteId, StoreError, StoreResult};
use serde_json::{Map, Value as JsonValue};

/// One resource representation as returned by the store.
pub type Record = Map<String, JsonValue>;

pub fn record_id(record: &Record) -> StoreResult<RemoteId> {
    opt_int(record, "id")
        .map(RemoteId)
        .ok_or_else(|| StoreError::decode("record has no integer 'id'"))
}

pub fn text(record: &Record, key: &str) -> StoreResult<String> {
    opt_text(record, key).ok_or_else(|| StoreError::decode(format!("record has no text '{}'", key)))
}

pub fn opt_text(record: &Record, key: &str) -> Option<String> {
    match record.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn int(record: &Record, key: &str) -> StoreResult<i64> {
    opt_int(record, key)
        .ok_or_else(|| StoreError::decode(format!("record has no integer '{}'", key)))
}

pub fn opt_int(record: &Record, key: &str) -> Option<i64> {
    match record.get(key)? {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn opt_bool(record: &Record, key: &str) -> Option<bool> {
    match record.get(key)? {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.as_str() {
            "true" | "True" | "1" => Some(true),
            "false" | "False" | "0" => Some(false),
            _ => None,
        },
        JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// Recorded position, if the representation carries a usable one.
pub fn position(record: &Record) -> Option<usize> {
    opt_int(record, "position").and_then(|p| usize::try_from(p).ok())
}
