//! FILENAME: core/pipeline/src/global_filter.rs
//! PURPOSE: The free-text filter matched against many columns at once.
//! CONTEXT: Runs after the column filters as an independent pass, with the
//! same per-level application and pruning.

use rowtree_model::Rows;
use std::sync::Arc;

use crate::columns::ColumnSet;
use crate::filter_types::{resolve_or_text, FilterValue};
use crate::filters::{filter_level, share_if_unchanged, ActiveFilter};
use crate::options::{Registries, TableOptions};

/// Column ids searched by the global filter: the configured subset that
/// exists, or every column with an accessor.
pub fn global_filter_column_ids(columns: &ColumnSet, options: &TableOptions) -> Vec<String> {
    match &options.global_filter_columns {
        Some(ids) => ids.iter().filter(|id| columns.contains(id)).cloned().collect(),
        None => columns
            .iter()
            .filter(|c| c.has_accessor())
            .map(|c| c.id.clone())
            .collect(),
    }
}

pub fn global_filter_rows(
    rows: &Rows,
    value: &FilterValue,
    columns: &ColumnSet,
    options: &TableOptions,
    registries: &Registries,
) -> Rows {
    let ids = global_filter_column_ids(columns, options);
    if ids.is_empty() || rows.is_empty() {
        return Arc::clone(rows);
    }
    let active = [ActiveFilter {
        ids,
        value: value.clone(),
        filter: resolve_or_text(&options.global_filter, registries),
    }];
    share_if_unchanged(rows, filter_level(rows, &active))
}
