//! FILENAME: core/model/src/value.rs
//! PURPOSE: Defines the resolved cell value produced by column accessors.
//! CONTEXT: `Value` is what every stage reads from a row. `GroupKey` is its
//! hashable normal form, used to partition rows when grouping.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A value resolved from a source record by a column accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// The accessor path did not exist on the record.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// True for `Undefined` and `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns the numeric content, if this is a finite-or-not number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric coercion used by loose comparisons: numbers, numeric text and booleans.
    pub fn coerce_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the display text of the value.
    /// Missing and null values display as the empty string.
    pub fn display_value(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::display_value)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Converts to the hashable grouping form.
    pub fn group_key(&self) -> GroupKey {
        GroupKey::from(self)
    }
}

fn format_number(n: f64) -> String {
    // Format without unnecessary decimal places
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_value())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Value::Null, Value::Number),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            // Nested objects are carried as their compact JSON text
            serde_json::Value::Object(_) => Value::Text(value.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::from(&value)
    }
}

/// Total ordering over values of mixed kinds.
///
/// Kind order: undefined < null < number < text < bool < date-time < list.
/// Numbers compare numerically with NaN equal to NaN and below every other number.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Less,
        (_, Value::Undefined) => Ordering::Greater,

        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,

        (Value::Number(na), Value::Number(nb)) => compare_f64(*na, *nb),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,

        (Value::Text(ta), Value::Text(tb)) => ta.cmp(tb),
        (Value::Text(_), _) => Ordering::Less,
        (_, Value::Text(_)) => Ordering::Greater,

        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        (Value::Bool(_), _) => Ordering::Less,
        (_, Value::Bool(_)) => Ordering::Greater,

        (Value::DateTime(da), Value::DateTime(db)) => da.cmp(db),
        (Value::DateTime(_), _) => Ordering::Less,
        (_, Value::DateTime(_)) => Ordering::Greater,

        (Value::List(la), Value::List(lb)) => {
            for (x, y) in la.iter().zip(lb.iter()) {
                let ord = compare_values(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            la.len().cmp(&lb.len())
        }
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

// ============================================================================
// GROUP KEY
// ============================================================================

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other, and -0.0 equals 0.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            // All NaN values hash to the same thing
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// A normalized, hashable representation of a value.
/// Rows with equal keys land in the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    Undefined,
    Null,
    Bool(bool),
    Number(OrderedFloat),
    Text(String),
    DateTime(NaiveDateTime),
    List(Vec<GroupKey>),
}

impl From<&Value> for GroupKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined => GroupKey::Undefined,
            Value::Null => GroupKey::Null,
            Value::Bool(b) => GroupKey::Bool(*b),
            Value::Number(n) => GroupKey::Number(OrderedFloat(*n)),
            Value::Text(s) => GroupKey::Text(s.clone()),
            Value::DateTime(dt) => GroupKey::DateTime(*dt),
            Value::List(items) => GroupKey::List(items.iter().map(GroupKey::from).collect()),
        }
    }
}

impl GroupKey {
    /// Converts the key back into the value it was built from.
    pub fn to_value(&self) -> Value {
        match self {
            GroupKey::Undefined => Value::Undefined,
            GroupKey::Null => Value::Null,
            GroupKey::Bool(b) => Value::Bool(*b),
            GroupKey::Number(n) => Value::Number(n.as_f64()),
            GroupKey::Text(s) => Value::Text(s.clone()),
            GroupKey::DateTime(dt) => Value::DateTime(*dt),
            GroupKey::List(items) => Value::List(items.iter().map(GroupKey::to_value).collect()),
        }
    }

    /// Display label for the key. Missing values label as "(blank)".
    pub fn label(&self) -> String {
        match self {
            GroupKey::Undefined | GroupKey::Null => "(blank)".to_string(),
            other => other.to_value().display_value(),
        }
    }
}
