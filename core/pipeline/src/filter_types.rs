//! FILENAME: core/pipeline/src/filter_types.rs
//! PURPOSE: Filter predicates and the built-in filter type table.
//! CONTEXT: A filter type is a predicate plus an auto-remove test. The test
//! decides whether a newly set filter value means "no filter" and should be
//! dropped from state. Built-in per-row predicates let group rows through;
//! whether a group survives is decided by its children.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use log::warn;
use once_cell::sync::Lazy;
use rowtree_model::{compare_values, Row, RowRef, Value};
use rustc_hash::FxHashMap;

use crate::columns::Column;
use crate::options::{Registries, TableOptions};

/// A filter value as stored in state.
pub type FilterValue = serde_json::Value;

pub type RowPredicate = Arc<dyn Fn(&Row, &[String], &FilterValue) -> bool + Send + Sync>;
pub type SetPredicate =
    Arc<dyn Fn(&[RowRef], &[String], &FilterValue) -> Vec<RowRef> + Send + Sync>;
pub type AutoRemoveFn = Arc<dyn Fn(&FilterValue) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum FilterPredicate {
    /// Applied to each row of a sibling list.
    PerRow(RowPredicate),
    /// Receives the whole sibling list and returns the survivors.
    WholeSet(SetPredicate),
}

#[derive(Clone)]
pub struct FilterType {
    pub predicate: FilterPredicate,
    pub auto_remove: Option<AutoRemoveFn>,
}

impl FilterType {
    pub fn per_row<F>(f: F) -> Self
    where
        F: Fn(&Row, &[String], &FilterValue) -> bool + Send + Sync + 'static,
    {
        FilterType {
            predicate: FilterPredicate::PerRow(Arc::new(f)),
            auto_remove: None,
        }
    }

    pub fn whole_set<F>(f: F) -> Self
    where
        F: Fn(&[RowRef], &[String], &FilterValue) -> Vec<RowRef> + Send + Sync + 'static,
    {
        FilterType {
            predicate: FilterPredicate::WholeSet(Arc::new(f)),
            auto_remove: None,
        }
    }

    pub fn with_auto_remove<F>(mut self, f: F) -> Self
    where
        F: Fn(&FilterValue) -> bool + Send + Sync + 'static,
    {
        self.auto_remove = Some(Arc::new(f));
        self
    }

    /// Without an explicit test only `null` removes the filter.
    pub fn should_auto_remove(&self, value: &FilterValue) -> bool {
        match &self.auto_remove {
            Some(f) => f(value),
            None => value.is_null(),
        }
    }

    /// Filters one sibling list.
    pub fn apply(&self, rows: &[RowRef], ids: &[String], value: &FilterValue) -> Vec<RowRef> {
        match &self.predicate {
            FilterPredicate::PerRow(predicate) => rows
                .iter()
                .filter(|row| predicate(row, ids, value))
                .cloned()
                .collect(),
            FilterPredicate::WholeSet(predicate) => predicate(rows, ids, value),
        }
    }
}

impl fmt::Debug for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.predicate {
            FilterPredicate::PerRow(_) => "PerRow",
            FilterPredicate::WholeSet(_) => "WholeSet",
        };
        f.debug_struct("FilterType")
            .field("predicate", &kind)
            .field("auto_remove", &self.auto_remove.is_some())
            .finish()
    }
}

/// A column's filter binding.
#[derive(Debug, Clone)]
pub enum ColumnFilter {
    Named(String),
    Custom(FilterType),
}

impl From<&str> for ColumnFilter {
    fn from(name: &str) -> Self {
        ColumnFilter::Named(name.to_string())
    }
}

impl From<String> for ColumnFilter {
    fn from(name: String) -> Self {
        ColumnFilter::Named(name)
    }
}

impl From<FilterType> for ColumnFilter {
    fn from(filter_type: FilterType) -> Self {
        ColumnFilter::Custom(filter_type)
    }
}

// ============================================================================
// FILTER VALUE HELPERS
// ============================================================================

/// Text form of a filter value. `null` is the empty string.
pub fn filter_text(value: &FilterValue) -> String {
    match value {
        FilterValue::Null => String::new(),
        FilterValue::String(s) => s.clone(),
        FilterValue::Bool(_) | FilterValue::Number(_) => Value::from(value).display_value(),
        other => other.to_string(),
    }
}

/// `null`, `false`, `0` and `""` count as no value.
pub fn is_falsy(value: &FilterValue) -> bool {
    match value {
        FilterValue::Null => true,
        FilterValue::Bool(b) => !b,
        FilterValue::Number(n) => n.as_f64().map_or(true, |n| n == 0.0),
        FilterValue::String(s) => s.is_empty(),
        FilterValue::Array(_) | FilterValue::Object(_) => false,
    }
}

fn is_empty_list(value: &FilterValue) -> bool {
    is_falsy(value) || value.as_array().map_or(false, |items| items.is_empty())
}

/// Elements of a list filter value; a scalar is a one-element list.
fn filter_list(value: &FilterValue) -> Vec<Value> {
    match value {
        FilterValue::Array(items) => items.iter().map(Value::from).collect(),
        other => vec![Value::from(other)],
    }
}

/// Loose equality: numbers against numeric text, null against undefined.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_nullish() || b.is_nullish() {
        return a.is_nullish() && b.is_nullish();
    }
    match (a.coerce_f64(), b.coerce_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.display_value() == b.display_value(),
    }
}

fn bound(value: Option<&FilterValue>) -> Option<f64> {
    value.and_then(FilterValue::as_f64)
}

// ============================================================================
// BUILT-IN PREDICATES
// ============================================================================

fn text(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let needle = filter_text(value).to_lowercase();
    ids.iter()
        .any(|id| row.value(id).display_value().to_lowercase().contains(&needle))
}

fn exact_text(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let needle = filter_text(value).to_lowercase();
    ids.iter().any(|id| {
        let cell = row.value(id);
        cell.is_undefined() || cell.display_value().to_lowercase() == needle
    })
}

fn exact_text_case(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let needle = filter_text(value);
    ids.iter().any(|id| {
        let cell = row.value(id);
        cell.is_undefined() || cell.display_value() == needle
    })
}

fn includes(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let target = Value::from(value);
    ids.iter()
        .any(|id| row.value(id).as_list().map_or(false, |items| items.contains(&target)))
}

fn includes_all(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let targets = filter_list(value);
    ids.iter().any(|id| {
        row.value(id)
            .as_list()
            .map_or(false, |items| targets.iter().all(|t| items.contains(t)))
    })
}

fn includes_some(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let targets = filter_list(value);
    ids.iter().any(|id| {
        row.value(id)
            .as_list()
            .map_or(false, |items| targets.iter().any(|t| items.contains(t)))
    })
}

fn exact(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let target = Value::from(value);
    ids.iter().any(|id| row.value(id) == &target)
}

fn equals(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let target = Value::from(value);
    ids.iter().any(|id| loose_eq(row.value(id), &target))
}

fn between(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let bounds = value.as_array();
    let mut min = bound(bounds.and_then(|b| b.first())).unwrap_or(f64::NEG_INFINITY);
    let mut max = bound(bounds.and_then(|b| b.get(1))).unwrap_or(f64::INFINITY);
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    ids.iter().any(|id| {
        row.value(id)
            .coerce_f64()
            .map_or(false, |n| n >= min && n <= max)
    })
}

/// Comparison operators accepted by the `compare` filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
        }
    }
}

/// Parses `{ "op": "gte", "value": 30 }`.
fn compare_spec(value: &FilterValue) -> Option<(CompareOp, Value)> {
    let op = CompareOp::parse(value.get("op")?.as_str()?)?;
    let operand = value.get("value")?;
    if operand.is_null() {
        return None;
    }
    Some((op, Value::from(operand)))
}

fn compare(row: &Row, ids: &[String], value: &FilterValue) -> bool {
    let Some((op, operand)) = compare_spec(value) else {
        return true;
    };
    ids.iter().any(|id| {
        let cell = row.value(id);
        if cell.is_nullish() {
            return false;
        }
        let ordering = match (cell.coerce_f64(), operand.coerce_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => Some(compare_values(cell, &operand)),
        };
        ordering.map_or(false, |o| op.matches(o))
    })
}

// ============================================================================
// BUILT-IN TABLE
// ============================================================================

/// Wraps a built-in predicate so group rows always pass.
fn builtin(predicate: fn(&Row, &[String], &FilterValue) -> bool) -> FilterType {
    FilterType::per_row(move |row, ids, value| row.is_grouped || predicate(row, ids, value))
}

/// The `text` filter type, used when nothing else resolves.
pub fn text_filter() -> FilterType {
    builtin(text).with_auto_remove(is_falsy)
}

static BUILTIN_FILTER_TYPES: Lazy<FxHashMap<&'static str, FilterType>> = Lazy::new(|| {
    let mut types = FxHashMap::default();
    types.insert("text", text_filter());
    types.insert("exactText", builtin(exact_text).with_auto_remove(is_falsy));
    types.insert("exactTextCase", builtin(exact_text_case).with_auto_remove(is_falsy));
    types.insert("includes", builtin(includes).with_auto_remove(is_empty_list));
    types.insert("includesAll", builtin(includes_all).with_auto_remove(is_empty_list));
    types.insert("includesSome", builtin(includes_some).with_auto_remove(is_empty_list));
    types.insert("exact", builtin(exact).with_auto_remove(FilterValue::is_null));
    types.insert("equals", builtin(equals).with_auto_remove(FilterValue::is_null));
    types.insert(
        "between",
        builtin(between).with_auto_remove(|value: &FilterValue| {
            let bounds = value.as_array();
            is_falsy(value)
                || (bound(bounds.and_then(|b| b.first())).is_none()
                    && bound(bounds.and_then(|b| b.get(1))).is_none())
        }),
    );
    types.insert(
        "compare",
        builtin(compare).with_auto_remove(|value: &FilterValue| compare_spec(value).is_none()),
    );
    types
});

pub fn builtin_filter_type(name: &str) -> Option<FilterType> {
    BUILTIN_FILTER_TYPES.get(name).cloned()
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// User registry first, then the built-ins.
pub fn resolve_named_filter(name: &str, registries: &Registries) -> Option<FilterType> {
    registries
        .filter_types
        .get(name)
        .cloned()
        .or_else(|| builtin_filter_type(name))
}

/// Resolves a named filter type, falling back to `text` with a warning.
pub(crate) fn resolve_or_text(name: &str, registries: &Registries) -> FilterType {
    resolve_named_filter(name, registries).unwrap_or_else(|| {
        warn!(
            target: "rowtree::filters",
            "Unknown filter type '{}', falling back to 'text'", name
        );
        text_filter()
    })
}

/// The default filter type configured in `options`.
pub(crate) fn default_filter_type(options: &TableOptions, registries: &Registries) -> FilterType {
    resolve_or_text(&options.default_filter, registries)
}

/// Resolves a column's filter binding: function, user name, built-in name, then the default.
pub(crate) fn resolve_column_filter(
    column: &Column,
    options: &TableOptions,
    registries: &Registries,
) -> FilterType {
    match &column.filter {
        Some(ColumnFilter::Custom(filter_type)) => filter_type.clone(),
        Some(ColumnFilter::Named(name)) => {
            resolve_named_filter(name, registries).unwrap_or_else(|| {
                warn!(
                    target: "rowtree::filters",
                    "Unknown filter type '{}' on column '{}', using the default filter",
                    name,
                    column.id
                );
                default_filter_type(options, registries)
            })
        }
        None => default_filter_type(options, registries),
    }
}

/// Resolves the filter for one state entry. A column with no filter binding
/// compares when given an `{"op", "value"}` object.
pub(crate) fn resolve_entry_filter(
    column: &Column,
    value: &FilterValue,
    options: &TableOptions,
    registries: &Registries,
) -> FilterType {
    if column.filter.is_none() && value.get("op").is_some() {
        if let Some(compare) = builtin_filter_type("compare") {
            return compare;
        }
    }
    resolve_column_filter(column, options, registries)
}
