//! FILENAME: core/model/src/record.rs
//! PURPOSE: Source records and dotted-path lookup.
//! CONTEXT: Source data is JSON-shaped. A string accessor such as
//! `"address.city"` or `"tags.0"` is resolved against a record here.

use crate::value::Value;

/// A source record as supplied by the caller.
pub type Record = serde_json::Value;

/// Walks a dotted path through nested objects and arrays.
/// Numeric segments index into arrays. Returns `None` when any segment is missing.
pub fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Record> {
    if path.is_empty() {
        return Some(record);
    }
    let mut current = record;
    for segment in path.split('.') {
        current = match current {
            Record::Object(map) => map.get(segment)?,
            Record::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves a dotted path to a `Value`. A missing path yields `Value::Undefined`.
pub fn resolve_path(record: &Record, path: &str) -> Value {
    match lookup_path(record, path) {
        Some(found) => Value::from(found),
        None => Value::Undefined,
    }
}

/// Returns the sub-record list stored under `key`, if the record carries one.
pub fn sub_records<'a>(record: &'a Record, key: &str) -> Option<&'a [Record]> {
    match record.get(key)? {
        Record::Array(items) => Some(items.as_slice()),
        _ => None,
    }
}
