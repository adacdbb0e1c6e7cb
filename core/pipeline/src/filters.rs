//! FILENAME: core/pipeline/src/filters.rs
//! PURPOSE: Per-column filtering of a row tree.
//! CONTEXT: Filter entries run in insertion order at each level, each
//! consuming the previous entry's survivors. Survivors are then filtered
//! recursively; a row whose children were all filtered away is dropped, but a
//! row that never had children is not. Subtrees that no filter touched keep
//! their identity.

use std::sync::Arc;

use rowtree_model::{Row, RowRef, Rows};
use rustc_hash::FxHashMap;

use crate::columns::ColumnSet;
use crate::filter_types::{resolve_entry_filter, FilterType, FilterValue};
use crate::options::{Registries, TableOptions};
use crate::state::Filters;

/// Root-level rows around one column's filter entry.
#[derive(Debug, Clone)]
pub struct ColumnFilterRows {
    pub pre_filtered_rows: Rows,
    pub filtered_rows: Rows,
}

#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub rows: Rows,
    /// Filtered columns only. Other columns see the final rows for both sets.
    pub column_rows: Arc<FxHashMap<String, ColumnFilterRows>>,
}

impl FilterOutput {
    pub fn passthrough(rows: &Rows) -> Self {
        FilterOutput {
            rows: Arc::clone(rows),
            column_rows: Arc::new(FxHashMap::default()),
        }
    }
}

pub(crate) struct ActiveFilter {
    pub(crate) ids: Vec<String>,
    pub(crate) value: FilterValue,
    pub(crate) filter: FilterType,
}

/// Applies every active column filter to the tree.
/// Entries on unknown columns are skipped. `can_filter` only gates the UI, so
/// an entry on a disabled column still applies.
pub fn filter_rows(
    rows: &Rows,
    filters: &Filters,
    columns: &ColumnSet,
    options: &TableOptions,
    registries: &Registries,
) -> FilterOutput {
    let active: Vec<ActiveFilter> = filters
        .iter()
        .filter_map(|entry| {
            let column = columns.get(&entry.id)?;
            Some(ActiveFilter {
                ids: vec![column.id.clone()],
                value: entry.value.clone(),
                filter: resolve_entry_filter(column, &entry.value, options, registries),
            })
        })
        .collect();

    if active.is_empty() || rows.is_empty() {
        return FilterOutput::passthrough(rows);
    }

    let mut column_rows = FxHashMap::default();
    let mut current: Vec<RowRef> = rows.to_vec();
    for entry in &active {
        let pre = Arc::new(current);
        current = entry.filter.apply(&pre, &entry.ids, &entry.value);
        column_rows.insert(
            entry.ids[0].clone(),
            ColumnFilterRows {
                pre_filtered_rows: pre,
                filtered_rows: Arc::new(current.clone()),
            },
        );
    }
    let filtered = filter_children(current, &active);

    FilterOutput {
        rows: share_if_unchanged(rows, filtered),
        column_rows: Arc::new(column_rows),
    }
}

/// Runs the active filters over one sibling list, then recurses.
pub(crate) fn filter_level(rows: &[RowRef], active: &[ActiveFilter]) -> Vec<RowRef> {
    let mut current: Vec<RowRef> = rows.to_vec();
    for entry in active {
        if current.is_empty() {
            break;
        }
        current = entry.filter.apply(&current, &entry.ids, &entry.value);
    }
    filter_children(current, active)
}

/// Recurses into the survivors of one level, pruning rows left without children.
fn filter_children(survivors: Vec<RowRef>, active: &[ActiveFilter]) -> Vec<RowRef> {
    survivors
        .into_iter()
        .filter_map(|row| {
            if !row.has_sub_rows() {
                return Some(row);
            }
            let children = filter_level(&row.sub_rows, active);
            if children.is_empty() {
                None
            } else if same_rows(&children, &row.sub_rows) {
                Some(row)
            } else {
                Some(Arc::new(rebuild_parent(&row, children)))
            }
        })
        .collect()
}

/// Copies `row` over its surviving children. Group rows recount their members.
fn rebuild_parent(row: &Row, children: Vec<RowRef>) -> Row {
    let mut rebuilt = row.with_sub_rows(children);
    if rebuilt.is_grouped {
        rebuilt.leaf_count = rebuilt
            .sub_rows
            .iter()
            .map(|child| if child.is_grouped { child.leaf_count } else { 1 })
            .sum();
    }
    rebuilt
}

fn same_rows(a: &[RowRef], b: &[RowRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}

/// Returns the input list itself when filtering kept every root node.
pub(crate) fn share_if_unchanged(input: &Rows, output: Vec<RowRef>) -> Rows {
    if same_rows(&output, input) {
        Arc::clone(input)
    } else {
        Arc::new(output)
    }
}
