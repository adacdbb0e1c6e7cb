//! FILENAME: core/pipeline/src/sort_types.rs
//! PURPOSE: Row comparators and the built-in sort type table.
//! CONTEXT: A sort function compares two rows on one column and always
//! returns the ascending order. Direction is applied by the sort engine.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rowtree_model::{compare_values, Row, Value};
use rustc_hash::FxHashMap;

use crate::error::ConfigurationError;
use crate::options::Registries;

pub type SortFn = Arc<dyn Fn(&Row, &Row, &str) -> Ordering + Send + Sync>;

/// A column's sort binding. Defaults to `alphanumeric`.
#[derive(Clone)]
pub enum SortType {
    Named(String),
    Custom(SortFn),
}

impl SortType {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Row, &Row, &str) -> Ordering + Send + Sync + 'static,
    {
        SortType::Custom(Arc::new(f))
    }
}

impl Default for SortType {
    fn default() -> Self {
        SortType::Named("alphanumeric".to_string())
    }
}

impl fmt::Debug for SortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortType::Named(name) => f.debug_tuple("Named").field(name).finish(),
            SortType::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for SortType {
    fn from(name: &str) -> Self {
        SortType::Named(name.to_string())
    }
}

// ============================================================================
// ALPHANUMERIC
// ============================================================================

/// Splits text into alternating digit and non-digit runs.
fn chunks(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;
    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        if in_digits.map_or(false, |d| d != is_digit) {
            out.push(&s[start..i]);
            start = i;
        }
        in_digits = Some(is_digit);
    }
    if start < s.len() {
        out.push(&s[start..]);
    }
    out
}

fn sort_text(value: &Value) -> String {
    match value {
        Value::Number(n) if n.is_nan() => String::new(),
        other => other.display_value(),
    }
}

/// Compares text chunk by chunk: digit runs numerically, text runs
/// lexically, a text run before a digit run. Ties fall to the chunk count.
pub fn compare_alphanumeric_text(a: &str, b: &str) -> Ordering {
    let ca = chunks(a);
    let cb = chunks(b);
    for (x, y) in ca.iter().zip(cb.iter()) {
        let xn = x.parse::<u128>().ok();
        let yn = y.parse::<u128>().ok();
        let ord = match (xn, yn) {
            (Some(xn), Some(yn)) => xn.cmp(&yn).then_with(|| x.len().cmp(&y.len())),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}

fn alphanumeric(a: &Row, b: &Row, column_id: &str) -> Ordering {
    let (va, vb) = (a.value(column_id), b.value(column_id));
    match (va, vb) {
        (Value::Number(x), Value::Number(y)) if !x.is_nan() && !y.is_nan() => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        _ => compare_alphanumeric_text(&sort_text(va), &sort_text(vb)),
    }
}

// ============================================================================
// DATETIME / BASIC / NUMBER
// ============================================================================

/// Date-times, or text in RFC 3339 / `%Y-%m-%d %H:%M:%S` / `%Y-%m-%d` form.
pub fn parse_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::DateTime(dt) => Some(*dt),
        Value::Text(s) => {
            let s = s.trim();
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.naive_utc())
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok())
                .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

/// Unparseable values sort before every date.
fn datetime(a: &Row, b: &Row, column_id: &str) -> Ordering {
    parse_datetime(a.value(column_id)).cmp(&parse_datetime(b.value(column_id)))
}

fn basic(a: &Row, b: &Row, column_id: &str) -> Ordering {
    compare_values(a.value(column_id), b.value(column_id))
}

/// Non-numeric values sort before every number.
fn number(a: &Row, b: &Row, column_id: &str) -> Ordering {
    let na = a.value(column_id).coerce_f64().filter(|n| !n.is_nan());
    let nb = b.value(column_id).coerce_f64().filter(|n| !n.is_nan());
    match (na, nb) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

static BUILTIN_SORT_TYPES: Lazy<FxHashMap<&'static str, SortFn>> = Lazy::new(|| {
    let mut types: FxHashMap<&'static str, SortFn> = FxHashMap::default();
    types.insert("alphanumeric", Arc::new(alphanumeric));
    types.insert("datetime", Arc::new(datetime));
    types.insert("basic", Arc::new(basic));
    types.insert("number", Arc::new(number));
    types
});

pub fn builtin_sort_type(name: &str) -> Option<SortFn> {
    BUILTIN_SORT_TYPES.get(name).cloned()
}

/// Function, then user registry, then built-ins.
pub(crate) fn resolve_sort_type(
    column_id: &str,
    sort_type: &SortType,
    registries: &Registries,
) -> Result<SortFn, ConfigurationError> {
    match sort_type {
        SortType::Custom(f) => Ok(Arc::clone(f)),
        SortType::Named(name) => registries
            .sort_types
            .get(name)
            .cloned()
            .or_else(|| builtin_sort_type(name))
            .ok_or_else(|| ConfigurationError::UnknownSortType {
                column_id: column_id.to_string(),
                sort_type: name.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowtree_model::{RowPath, RowValues};
    use serde_json::json;

    fn row(value: Value) -> Row {
        let mut values = RowValues::default();
        values.insert("a".to_string(), value);
        Row::new(0, RowPath::from_indices(&[0]), 0, Arc::new(json!({})), values, Vec::new())
    }

    fn cmp(name: &str, a: Value, b: Value) -> Ordering {
        let f = builtin_sort_type(name).unwrap();
        f(&row(a), &row(b), "a")
    }

    #[test]
    fn test_chunks_split_digit_runs() {
        assert_eq!(chunks("item10b"), vec!["item", "10", "b"]);
        assert_eq!(chunks("42"), vec!["42"]);
        assert!(chunks("").is_empty());
    }

    #[test]
    fn test_alphanumeric_orders_digit_runs_numerically() {
        assert_eq!(compare_alphanumeric_text("item2", "item10"), Ordering::Less);
        assert_eq!(compare_alphanumeric_text("a", "1"), Ordering::Less);
        assert_eq!(compare_alphanumeric_text("abc", "abc1"), Ordering::Less);
        assert_eq!(compare_alphanumeric_text("B", "a"), Ordering::Less);
        assert_eq!(
            cmp("alphanumeric", Value::Number(9.0), Value::Number(10.0)),
            Ordering::Less
        );
        assert_eq!(
            cmp("alphanumeric", Value::Undefined, Value::text("a")),
            Ordering::Less
        );
    }

    #[test]
    fn test_datetime_parses_text() {
        assert_eq!(
            cmp("datetime", Value::text("2024-01-02"), Value::text("2023-12-31T23:00:00")),
            Ordering::Greater
        );
        assert_eq!(
            cmp("datetime", Value::text("not a date"), Value::text("2020-01-01")),
            Ordering::Less
        );
    }

    #[test]
    fn test_number_and_basic() {
        assert_eq!(cmp("number", Value::text("10"), Value::text("9")), Ordering::Greater);
        assert_eq!(cmp("number", Value::Null, Value::Number(-5.0)), Ordering::Less);
        assert_eq!(cmp("basic", Value::text("10"), Value::text("9")), Ordering::Less);
    }

    #[test]
    fn test_unknown_sort_type_is_configuration_error() {
        let err = resolve_sort_type("a", &"fuzzy".into(), &Registries::new()).err().unwrap();
        assert_eq!(
            err,
            ConfigurationError::UnknownSortType {
                column_id: "a".to_string(),
                sort_type: "fuzzy".to_string()
            }
        );
        assert!(resolve_sort_type("a", &SortType::default(), &Registries::new()).is_ok());
    }
}
