//! FILENAME: core/pipeline/src/actions.rs
//! PURPOSE: The closed set of state transitions and their reducers.
//! CONTEXT: Every change to `TableState` goes through `reduce`, a pure
//! function of (old state, action, context). Reset actions return the slice
//! to the table's initial state.

use std::fmt;
use std::sync::Arc;

use rowtree_model::RowPath;

use crate::columns::ColumnSet;
use crate::error::TableResult;
use crate::filter_types::{
    default_filter_type, resolve_entry_filter, resolve_or_text, FilterValue,
};
use crate::options::{Registries, TableOptions};
use crate::state::{ExpandedState, Filters, SortingRule, TableState};

/// A new value, or a function of the previous one.
pub enum Updater<T> {
    Value(T),
    Func(Arc<dyn Fn(&T) -> T + Send + Sync>),
}

impl<T: Clone> Updater<T> {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        Updater::Func(Arc::new(f))
    }

    pub fn apply(&self, old: &T) -> T {
        match self {
            Updater::Value(value) => value.clone(),
            Updater::Func(f) => f(old),
        }
    }
}

impl<T: Clone> Clone for Updater<T> {
    fn clone(&self) -> Self {
        match self {
            Updater::Value(value) => Updater::Value(value.clone()),
            Updater::Func(f) => Updater::Func(Arc::clone(f)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Updater<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Updater::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Updater::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl<T> From<T> for Updater<T> {
    fn from(value: T) -> Self {
        Updater::Value(value)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// `None` (or a value the column's filter type auto-removes) clears the filter.
    SetFilter {
        column_id: String,
        value: Updater<Option<FilterValue>>,
    },
    SetAllFilters(Updater<Filters>),
    ResetFilters,
    SetGlobalFilter(Updater<Option<FilterValue>>),
    ResetGlobalFilter,
    ToggleGroupBy {
        column_id: String,
        value: Option<bool>,
    },
    ResetGroupBy,
    ToggleSortBy {
        column_id: String,
        desc: Option<bool>,
        multi: bool,
    },
    ClearSortBy {
        column_id: String,
    },
    ResetSortBy,
    ToggleExpandedByPath {
        path: RowPath,
        expanded: Option<bool>,
    },
    ToggleAllRowsExpanded(Option<bool>),
    ResetExpanded,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetFilter { .. } => "setFilter",
            Action::SetAllFilters(_) => "setAllFilters",
            Action::ResetFilters => "resetFilters",
            Action::SetGlobalFilter(_) => "setGlobalFilter",
            Action::ResetGlobalFilter => "resetGlobalFilter",
            Action::ToggleGroupBy { .. } => "toggleGroupBy",
            Action::ResetGroupBy => "resetGroupBy",
            Action::ToggleSortBy { .. } => "toggleSortBy",
            Action::ClearSortBy { .. } => "clearSortBy",
            Action::ResetSortBy => "resetSortBy",
            Action::ToggleExpandedByPath { .. } => "toggleExpandedByPath",
            Action::ToggleAllRowsExpanded(_) => "toggleAllRowsExpanded",
            Action::ResetExpanded => "resetExpanded",
        }
    }

    pub fn set_filter(column_id: impl Into<String>, value: impl Into<Option<FilterValue>>) -> Self {
        Action::SetFilter {
            column_id: column_id.into(),
            value: Updater::Value(value.into()),
        }
    }

    pub fn set_global_filter(value: impl Into<Option<FilterValue>>) -> Self {
        Action::SetGlobalFilter(Updater::Value(value.into()))
    }

    pub fn toggle_group_by(column_id: impl Into<String>) -> Self {
        Action::ToggleGroupBy {
            column_id: column_id.into(),
            value: None,
        }
    }

    pub fn toggle_sort_by(column_id: impl Into<String>, desc: Option<bool>, multi: bool) -> Self {
        Action::ToggleSortBy {
            column_id: column_id.into(),
            desc,
            multi,
        }
    }

    pub fn toggle_expanded(path: RowPath) -> Self {
        Action::ToggleExpandedByPath {
            path,
            expanded: None,
        }
    }
}

/// What reducers may read besides the state itself.
#[derive(Debug, Clone, Copy)]
pub struct ReducerContext<'a> {
    pub columns: &'a ColumnSet,
    pub options: &'a TableOptions,
    pub registries: &'a Registries,
    pub initial_state: &'a TableState,
}

pub fn reduce(state: &TableState, action: &Action, ctx: &ReducerContext<'_>) -> TableResult<TableState> {
    let mut next = state.clone();
    match action {
        Action::SetFilter { column_id, value } => {
            set_filter(&mut next, column_id, value, ctx)?;
        }
        Action::SetAllFilters(updater) => {
            let mut filters = updater.apply(&state.filters);
            filters.retain(|entry| !should_remove_filter(&entry.id, &entry.value, ctx));
            next.filters = filters;
        }
        Action::ResetFilters => next.filters = ctx.initial_state.filters.clone(),
        Action::SetGlobalFilter(updater) => {
            let value = updater.apply(&state.global_filter);
            let filter_type = resolve_or_text(&ctx.options.global_filter, ctx.registries);
            next.global_filter = value.filter(|v| !filter_type.should_auto_remove(v));
        }
        Action::ResetGlobalFilter => next.global_filter = ctx.initial_state.global_filter.clone(),
        Action::ToggleGroupBy { column_id, value } => {
            ctx.columns.require(column_id, "toggling group by")?;
            let present = state.group_by.iter().any(|id| id == column_id);
            let on = value.unwrap_or(!present);
            if on && !present {
                next.group_by.push(column_id.clone());
            } else if !on {
                next.group_by.retain(|id| id != column_id);
            }
        }
        Action::ResetGroupBy => next.group_by = ctx.initial_state.group_by.clone(),
        Action::ToggleSortBy {
            column_id,
            desc,
            multi,
        } => {
            next.sort_by = toggle_sort_by(&state.sort_by, column_id, *desc, *multi, ctx)?;
        }
        Action::ClearSortBy { column_id } => next.sort_by.retain(|rule| &rule.id != column_id),
        Action::ResetSortBy => next.sort_by = ctx.initial_state.sort_by.clone(),
        Action::ToggleExpandedByPath { path, expanded } => next.expanded.toggle(path, *expanded),
        Action::ToggleAllRowsExpanded(value) => {
            let expand_all = value.unwrap_or(!state.expanded.is_all_rows_expanded());
            next.expanded = if expand_all {
                ExpandedState::all()
            } else {
                ExpandedState::default()
            };
        }
        Action::ResetExpanded => next.expanded = ctx.initial_state.expanded.clone(),
    }
    Ok(next)
}

fn set_filter(
    next: &mut TableState,
    column_id: &str,
    updater: &Updater<Option<FilterValue>>,
    ctx: &ReducerContext<'_>,
) -> TableResult<()> {
    ctx.columns.require(column_id, "setting a filter")?;
    let previous = next.filters.get(column_id).cloned();
    match updater.apply(&previous) {
        Some(value) if !should_remove_filter(column_id, &value, ctx) => {
            next.filters.set(column_id, value);
        }
        _ => {
            next.filters.remove(column_id);
        }
    }
    Ok(())
}

/// Asks the column's filter type whether `value` means "no filter".
fn should_remove_filter(column_id: &str, value: &FilterValue, ctx: &ReducerContext<'_>) -> bool {
    let filter_type = match ctx.columns.get(column_id) {
        Some(column) => resolve_entry_filter(column, value, ctx.options, ctx.registries),
        None => default_filter_type(ctx.options, ctx.registries),
    };
    filter_type.should_auto_remove(value)
}

enum SortAction {
    Add,
    Replace,
    Toggle,
    Remove,
}

fn toggle_sort_by(
    sort_by: &[SortingRule],
    column_id: &str,
    desc: Option<bool>,
    multi: bool,
    ctx: &ReducerContext<'_>,
) -> TableResult<Vec<SortingRule>> {
    let column = ctx.columns.require(column_id, "toggling sort by")?;
    let options = ctx.options;
    let sort_desc_first = column.sort_desc_first;
    let existing = sort_by.iter().position(|rule| rule.id == column_id);
    let multi = multi && !options.disable_multi_sort;

    let mut action = if multi {
        if existing.is_some() {
            SortAction::Toggle
        } else {
            SortAction::Add
        }
    } else if sort_by.len() == 1 && existing == Some(0) {
        SortAction::Toggle
    } else {
        SortAction::Replace
    };

    // A toggle without an explicit direction removes the key at its second direction
    let is_toggle = matches!(action, SortAction::Toggle);
    if let (true, Some(index)) = (is_toggle, existing) {
        let removable = !options.disable_sort_remove
            && desc.is_none()
            && (!multi || !options.disable_multi_remove);
        if removable && sort_by[index].desc != sort_desc_first {
            action = SortAction::Remove;
        }
    }

    let rule = |desc: bool| SortingRule {
        id: column_id.to_string(),
        desc,
    };

    Ok(match action {
        SortAction::Replace => vec![rule(desc.unwrap_or(sort_desc_first))],
        SortAction::Add => {
            let mut next = sort_by.to_vec();
            next.push(rule(desc.unwrap_or(sort_desc_first)));
            let max = options.max_multi_sort_col_count.max(1);
            if next.len() > max {
                next.drain(..next.len() - max);
            }
            next
        }
        SortAction::Toggle => sort_by
            .iter()
            .map(|r| {
                if r.id == column_id {
                    rule(desc.unwrap_or(!r.desc))
                } else {
                    r.clone()
                }
            })
            .collect(),
        SortAction::Remove => sort_by
            .iter()
            .filter(|r| r.id != column_id)
            .cloned()
            .collect(),
    })
}
