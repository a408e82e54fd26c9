//! Typed field extraction from decoded messages.
//!
//! Every protocol struct is built from a [`Map`] through these helpers, so a
//! field of the wrong kind fails with `InvalidField` naming the field instead
//! of surfacing later as a bad cast. An explicit `null` counts as absent.

use crate::error::{Result, ShellError};
use crate::value::{Map, Value};

/// Unwrap a decoded message that must be a map.
pub(crate) fn into_map(value: Value, what: &str) -> Result<Map> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(ShellError::ProtocolDecode(format!(
            "{} must be a map, found {}",
            what,
            other.kind()
        ))),
    }
}

fn take(map: &mut Map, field: &str) -> Option<Value> {
    map.remove(field).filter(|v| !v.is_null())
}

fn invalid(field: &'static str, expected: &'static str, found: &Value) -> ShellError {
    ShellError::InvalidField {
        field,
        expected,
        found: found.kind(),
    }
}

pub(crate) fn opt_string(map: &mut Map, field: &'static str) -> Result<Option<String>> {
    match take(map, field) {
        None => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(field, "a string", &other)),
    }
}

pub(crate) fn req_string(map: &mut Map, field: &'static str, context: &str) -> Result<String> {
    opt_string(map, field)?.ok_or_else(|| ShellError::missing(context, field))
}

pub(crate) fn opt_i64(map: &mut Map, field: &'static str) -> Result<Option<i64>> {
    match take(map, field) {
        None => Ok(None),
        Some(Value::Int(n)) => Ok(Some(n)),
        Some(other) => Err(invalid(field, "an integer", &other)),
    }
}

pub(crate) fn req_i64(map: &mut Map, field: &'static str, context: &str) -> Result<i64> {
    opt_i64(map, field)?.ok_or_else(|| ShellError::missing(context, field))
}

pub(crate) fn opt_bool(map: &mut Map, field: &'static str) -> Result<Option<bool>> {
    match take(map, field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(invalid(field, "a bool", &other)),
    }
}

pub(crate) fn opt_array(map: &mut Map, field: &'static str) -> Result<Option<Vec<Value>>> {
    match take(map, field) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(invalid(field, "an array", &other)),
    }
}

pub(crate) fn req_array(map: &mut Map, field: &'static str, context: &str) -> Result<Vec<Value>> {
    opt_array(map, field)?.ok_or_else(|| ShellError::missing(context, field))
}

pub(crate) fn opt_map(map: &mut Map, field: &'static str) -> Result<Option<Map>> {
    match take(map, field) {
        None => Ok(None),
        Some(Value::Map(inner)) => Ok(Some(inner)),
        Some(other) => Err(invalid(field, "a map", &other)),
    }
}

/// Tuple ids may arrive as integers or strings depending on the worker.
/// They are always handed on as strings because acking keys are strings.
pub(crate) fn normalize_id(field: &'static str, value: Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Int(n) => Ok(n.to_string()),
        other => Err(invalid(field, "a string or integer", &other)),
    }
}

pub(crate) fn opt_id(map: &mut Map, field: &'static str) -> Result<Option<String>> {
    take(map, field).map(|v| normalize_id(field, v)).transpose()
}

pub(crate) fn req_id(map: &mut Map, field: &'static str, context: &str) -> Result<String> {
    opt_id(map, field)?.ok_or_else(|| ShellError::missing(context, field))
}

pub(crate) fn opt_id_array(map: &mut Map, field: &'static str) -> Result<Option<Vec<String>>> {
    opt_array(map, field)?
        .map(|items| items.into_iter().map(|v| normalize_id(field, v)).collect())
        .transpose()
}
