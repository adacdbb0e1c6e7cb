//! FILENAME: core/pipeline/src/lib.rs
//! PURPOSE: Headless row-transformation engine.
//! CONTEXT: Turns records plus a column schema into a grouped, filtered,
//! sorted and expanded row tree. Each generation runs
//! materialize -> group -> column filters -> global filter -> sort -> expand,
//! rerunning only the stages whose inputs changed.
//!
//! Most callers only need `Table`, `ColumnSpec`, `Action` and `RowModel`.

pub mod actions;
pub mod aggregation;
pub mod columns;
pub mod error;
pub mod expanded;
pub mod filter_types;
pub mod filters;
pub mod global_filter;
pub mod grouping;
pub mod materialize;
pub mod options;
pub mod pipeline;
pub mod sort_types;
pub mod sorting;
pub mod stage;
pub mod state;
pub mod table;

// Re-export commonly used types at the crate root
pub use actions::{reduce, Action, ReducerContext, Updater};
pub use aggregation::{
    Aggregate, AggregateFn, AggregationType, Aggregator, ChainMode, NumericSummary,
};
pub use columns::{resolve_columns, Accessor, AccessorContext, Column, ColumnSet, ColumnSpec};
pub use error::{AggregateError, ConfigurationError, SchemaError, TableError, TableResult};
pub use expanded::{expand_rows, ExpandOptions, ExpandOutput, ExpandedRow};
pub use filter_types::{
    builtin_filter_type, ColumnFilter, CompareOp, FilterPredicate, FilterType, FilterValue,
};
pub use filters::{filter_rows, ColumnFilterRows, FilterOutput};
pub use global_filter::global_filter_rows;
pub use grouping::group_rows;
pub use materialize::materialize_rows;
pub use options::{Registries, TableOptions};
pub use pipeline::{ColumnState, Dataset, RowModel, RowPipeline, StageRuns};
pub use sort_types::{builtin_sort_type, SortFn, SortType};
pub use sorting::sort_rows;
pub use stage::{Identity, Memoized, Stage, StageContext};
pub use state::{ExpandedState, FilterEntry, Filters, SortingRule, TableState};
pub use table::{FetchListener, FetchRequest, Table, TableBuilder};

pub use rowtree_model::{
    GroupKey, PathSegment, Record, Row, RowPath, RowRef, Rows, Value,
};
