//! FILENAME: core/pipeline/src/options.rs
//! PURPOSE: Table configuration.
//! CONTEXT: `TableOptions` is plain serializable data (flags, names, limits)
//! and can be loaded from JSON. Function-valued configuration lives in
//! `Registries`, keyed by the names the options and columns refer to.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rowtree_model::{Row, RowRef, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregateFn, ChainMode};
use crate::error::AggregateError;
use crate::expanded::ExpandOptions;
use crate::filter_types::FilterType;
use crate::sort_types::SortFn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableOptions {
    // Manual modes: the caller already performed the stage, rows pass through.
    pub manual_group_by: bool,
    pub manual_filters: bool,
    pub manual_global_filter: bool,
    pub manual_sorting: bool,

    pub disable_filters: bool,
    pub disable_global_filter: bool,
    pub disable_sorting: bool,
    pub disable_group_by: bool,

    /// Record key holding nested sub-records.
    pub sub_rows_key: String,
    pub paginate_expanded_rows: bool,
    pub expand_sub_rows: bool,

    pub disable_multi_sort: bool,
    pub max_multi_sort_col_count: usize,
    pub disable_sort_remove: bool,
    pub disable_multi_remove: bool,

    /// Filterability of columns without an accessor.
    pub default_can_filter: bool,
    /// Filter type name used by columns without a filter binding.
    pub default_filter: String,
    /// Filter type name used by the global filter.
    pub global_filter: String,
    /// Columns searched by the global filter; all accessor columns when `None`.
    pub global_filter_columns: Option<Vec<String>>,

    pub chain_mode: ChainMode,

    // Applied by `Table::set_data`.
    pub auto_reset_expanded: bool,
    pub auto_reset_filters: bool,
    pub auto_reset_global_filter: bool,
    pub auto_reset_sort_by: bool,
    pub auto_reset_group_by: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            manual_group_by: false,
            manual_filters: false,
            manual_global_filter: false,
            manual_sorting: false,
            disable_filters: false,
            disable_global_filter: false,
            disable_sorting: false,
            disable_group_by: false,
            sub_rows_key: "subRows".to_string(),
            paginate_expanded_rows: true,
            expand_sub_rows: true,
            disable_multi_sort: false,
            max_multi_sort_col_count: usize::MAX,
            disable_sort_remove: false,
            disable_multi_remove: false,
            default_can_filter: false,
            default_filter: "text".to_string(),
            global_filter: "text".to_string(),
            global_filter_columns: None,
            chain_mode: ChainMode::Cumulative,
            auto_reset_expanded: true,
            auto_reset_filters: true,
            auto_reset_global_filter: true,
            auto_reset_sort_by: true,
            auto_reset_group_by: true,
        }
    }
}

impl TableOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            paginate_expanded_rows: self.paginate_expanded_rows,
            expand_sub_rows: self.expand_sub_rows,
        }
    }

    pub(crate) fn grouping_active(&self) -> bool {
        !(self.manual_group_by || self.disable_group_by)
    }

    /// `disable_filters` only hides filtering in the column state.
    pub(crate) fn filtering_active(&self) -> bool {
        !self.manual_filters
    }

    pub(crate) fn global_filtering_active(&self) -> bool {
        !(self.manual_global_filter || self.disable_global_filter)
    }

    pub(crate) fn sorting_active(&self) -> bool {
        !(self.manual_sorting || self.disable_sorting)
    }
}

/// User-supplied filter types, sort types and aggregations, looked up by
/// name before the built-ins.
#[derive(Clone, Default)]
pub struct Registries {
    pub filter_types: FxHashMap<String, FilterType>,
    pub sort_types: FxHashMap<String, SortFn>,
    pub aggregations: FxHashMap<String, AggregateFn>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_type(mut self, name: impl Into<String>, filter_type: FilterType) -> Self {
        self.filter_types.insert(name.into(), filter_type);
        self
    }

    pub fn with_sort_type<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Row, &Row, &str) -> Ordering + Send + Sync + 'static,
    {
        self.sort_types.insert(name.into(), Arc::new(f));
        self
    }

    pub fn with_aggregation<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value], &[RowRef]) -> Result<Value, AggregateError> + Send + Sync + 'static,
    {
        self.aggregations.insert(name.into(), Arc::new(f));
        self
    }
}

impl fmt::Debug for Registries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |map: Vec<&String>| {
            let mut names: Vec<String> = map.into_iter().cloned().collect();
            names.sort();
            names
        };
        f.debug_struct("Registries")
            .field("filter_types", &names(self.filter_types.keys().collect()))
            .field("sort_types", &names(self.sort_types.keys().collect()))
            .field("aggregations", &names(self.aggregations.keys().collect()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TableOptions::default();
        assert_eq!(options.sub_rows_key, "subRows");
        assert!(options.paginate_expanded_rows);
        assert_eq!(options.default_filter, "text");
        assert!(options.sorting_active());
    }

    #[test]
    fn test_loads_partial_camel_case_json() {
        let options = TableOptions::from_json(
            r#"{"manualSorting": true, "subRowsKey": "children", "chainMode": "leafValues", "maxMultiSortColCount": 2}"#,
        )
        .unwrap();
        assert!(options.manual_sorting);
        assert!(!options.sorting_active());
        assert_eq!(options.sub_rows_key, "children");
        assert_eq!(options.chain_mode, ChainMode::LeafValues);
        assert_eq!(options.max_multi_sort_col_count, 2);
        assert!(options.auto_reset_filters);
    }

    #[test]
    fn test_registries_debug_lists_names() {
        let registries = Registries::new()
            .with_sort_type("b", |_, _, _| Ordering::Equal)
            .with_sort_type("a", |_, _, _| Ordering::Equal);
        assert_eq!(
            format!("{:?}", registries),
            r#"Registries { filter_types: [], sort_types: ["a", "b"], aggregations: [] }"#
        );
    }
}
