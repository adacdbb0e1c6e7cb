//! FILENAME: core/pipeline/src/columns.rs
//! PURPOSE: Column schema and accessor resolution.
//! CONTEXT: Callers describe columns with `ColumnSpec` (possibly nested in
//! header groups). `resolve_columns` validates ids, flattens header groups
//! depth-first and produces the `ColumnSet` every stage reads from.

use std::fmt;
use std::sync::Arc;

use rowtree_model::{resolve_path, Record, Value};
use rustc_hash::FxHashMap;

use crate::aggregation::Aggregate;
use crate::error::SchemaError;
use crate::filter_types::ColumnFilter;
use crate::options::TableOptions;
use crate::sort_types::SortType;

// ============================================================================
// ACCESSORS
// ============================================================================

/// What an accessor function sees besides the record itself.
#[derive(Debug, Clone, Copy)]
pub struct AccessorContext<'a> {
    /// Index of the record among its siblings.
    pub index: usize,
    pub depth: usize,
    /// Ancestor records, root first.
    pub ancestors: &'a [Arc<Record>],
}

pub type AccessorFn = Arc<dyn Fn(&Record, &AccessorContext<'_>) -> Value + Send + Sync>;

/// How a column extracts its value from a record.
#[derive(Clone)]
pub enum Accessor {
    /// Dotted path such as `"address.city"` or `"tags.0"`.
    Path(String),
    Func(AccessorFn),
}

impl Accessor {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Record, &AccessorContext<'_>) -> Value + Send + Sync + 'static,
    {
        Accessor::Func(Arc::new(f))
    }

    pub fn resolve(&self, record: &Record, ctx: &AccessorContext<'_>) -> Value {
        match self {
            Accessor::Path(path) => resolve_path(record, path),
            Accessor::Func(f) => f(record, ctx),
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Accessor::Func(_) => f.write_str("Func(..)"),
        }
    }
}

// ============================================================================
// COLUMN SPEC (caller input)
// ============================================================================

/// A column as described by the caller.
#[derive(Debug, Clone, Default)]
pub struct ColumnSpec {
    pub id: Option<String>,
    pub header: Option<String>,
    pub accessor: Option<Accessor>,
    /// Child columns; a spec with children is a header group, not a leaf.
    pub columns: Vec<ColumnSpec>,
    pub aggregate: Option<Aggregate>,
    pub filter: Option<ColumnFilter>,
    pub sort_type: Option<SortType>,
    pub sort_desc_first: bool,
    pub sort_inverted: bool,
    pub disable_filters: bool,
    pub disable_sorting: bool,
    pub disable_group_by: bool,
    pub default_can_filter: Option<bool>,
    pub visible: Option<bool>,
}

impl ColumnSpec {
    /// A column reading a dotted path. The path doubles as the id.
    pub fn accessor(path: impl Into<String>) -> Self {
        ColumnSpec {
            accessor: Some(Accessor::Path(path.into())),
            ..Default::default()
        }
    }

    /// A column computed by a function. Function accessors always need an id.
    pub fn computed<F>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record, &AccessorContext<'_>) -> Value + Send + Sync + 'static,
    {
        ColumnSpec {
            id: Some(id.into()),
            accessor: Some(Accessor::func(f)),
            ..Default::default()
        }
    }

    /// A column with no accessor; its value is always `Undefined`.
    pub fn display(id: impl Into<String>) -> Self {
        ColumnSpec {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// A header group wrapping child columns.
    pub fn group(header: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        ColumnSpec {
            header: Some(header.into()),
            columns,
            ..Default::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn aggregate(mut self, aggregate: impl Into<Aggregate>) -> Self {
        self.aggregate = Some(aggregate.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<ColumnFilter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort_type(mut self, sort_type: impl Into<SortType>) -> Self {
        self.sort_type = Some(sort_type.into());
        self
    }

    pub fn sort_desc_first(mut self, value: bool) -> Self {
        self.sort_desc_first = value;
        self
    }

    pub fn sort_inverted(mut self, value: bool) -> Self {
        self.sort_inverted = value;
        self
    }

    pub fn disable_filters(mut self, value: bool) -> Self {
        self.disable_filters = value;
        self
    }

    pub fn disable_sorting(mut self, value: bool) -> Self {
        self.disable_sorting = value;
        self
    }

    pub fn disable_group_by(mut self, value: bool) -> Self {
        self.disable_group_by = value;
        self
    }

    pub fn default_can_filter(mut self, value: bool) -> Self {
        self.default_can_filter = Some(value);
        self
    }

    pub fn visible(mut self, value: bool) -> Self {
        self.visible = Some(value);
        self
    }
}

// ============================================================================
// RESOLVED COLUMNS
// ============================================================================

/// A validated leaf column.
#[derive(Debug, Clone)]
pub struct Column {
    pub id: String,
    pub header: String,
    pub accessor: Option<Accessor>,
    /// Position in the flattened leaf order.
    pub position: usize,
    pub aggregate: Option<Aggregate>,
    pub filter: Option<ColumnFilter>,
    pub sort_type: SortType,
    pub sort_desc_first: bool,
    pub sort_inverted: bool,
    pub disable_filters: bool,
    pub disable_sorting: bool,
    pub disable_group_by: bool,
    pub default_can_filter: Option<bool>,
    pub visible: bool,
}

impl Column {
    /// Resolves this column's value for a record. Columns without accessor yield `Undefined`.
    pub fn resolve(&self, record: &Record, ctx: &AccessorContext<'_>) -> Value {
        match &self.accessor {
            Some(accessor) => accessor.resolve(record, ctx),
            None => Value::Undefined,
        }
    }

    pub fn has_accessor(&self) -> bool {
        self.accessor.is_some()
    }

    /// Columns with an accessor are filterable unless disabled; accessor-less
    /// columns fall back to `default_can_filter`.
    pub fn can_filter(&self, options: &TableOptions) -> bool {
        if self.has_accessor() {
            !(self.disable_filters || options.disable_filters)
        } else {
            self.default_can_filter.unwrap_or(options.default_can_filter)
        }
    }

    pub fn can_sort(&self, options: &TableOptions) -> bool {
        self.has_accessor() && !(self.disable_sorting || options.disable_sorting)
    }

    pub fn can_group_by(&self, options: &TableOptions) -> bool {
        self.has_accessor() && !(self.disable_group_by || options.disable_group_by)
    }
}

/// The flattened, validated leaf columns of a schema.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<Column>,
    by_id: FxHashMap<String, usize>,
}

impl ColumnSet {
    pub fn get(&self, id: &str) -> Option<&Column> {
        self.by_id.get(id).map(|&i| &self.columns[i])
    }

    /// Looks up a column, failing with `SchemaError::UnknownColumn` for `operation`.
    pub fn require(&self, id: &str, operation: &'static str) -> Result<&Column, SchemaError> {
        self.get(id)
            .ok_or_else(|| SchemaError::unknown_column(id, operation))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Leaf columns shown by default: visible and not currently grouped on.
    pub fn visible_ids(&self, group_by: &[String]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.visible && !group_by.iter().any(|g| g == &c.id))
            .map(|c| c.id.clone())
            .collect()
    }
}

/// Validates a schema and flattens header groups depth-first into leaf columns.
pub fn resolve_columns(specs: &[ColumnSpec]) -> Result<ColumnSet, SchemaError> {
    let mut set = ColumnSet::default();
    let mut position = 0;
    flatten_specs(specs, &mut set, &mut position)?;
    Ok(set)
}

fn flatten_specs(
    specs: &[ColumnSpec],
    set: &mut ColumnSet,
    position: &mut usize,
) -> Result<(), SchemaError> {
    for spec in specs {
        let current = *position;
        *position += 1;

        if !spec.columns.is_empty() {
            flatten_specs(&spec.columns, set, position)?;
            continue;
        }

        let id = leaf_id(spec, current)?;
        if set.by_id.contains_key(&id) {
            return Err(SchemaError::DuplicateColumnId(id));
        }

        let column = Column {
            header: spec.header.clone().unwrap_or_else(|| id.clone()),
            accessor: spec.accessor.clone(),
            position: set.columns.len(),
            aggregate: spec.aggregate.clone(),
            filter: spec.filter.clone(),
            sort_type: spec.sort_type.clone().unwrap_or_default(),
            sort_desc_first: spec.sort_desc_first,
            sort_inverted: spec.sort_inverted,
            disable_filters: spec.disable_filters,
            disable_sorting: spec.disable_sorting,
            disable_group_by: spec.disable_group_by,
            default_can_filter: spec.default_can_filter,
            visible: spec.visible.unwrap_or(true),
            id: id.clone(),
        };
        set.by_id.insert(id, set.columns.len());
        set.columns.push(column);
    }
    Ok(())
}

/// `id` wins; a path accessor supplies the id otherwise.
fn leaf_id(spec: &ColumnSpec, position: usize) -> Result<String, SchemaError> {
    let id = match (&spec.id, &spec.accessor) {
        (Some(id), _) => id.clone(),
        (None, Some(Accessor::Path(path))) => path.clone(),
        (None, _) => return Err(SchemaError::MissingColumnId { position }),
    };
    if id.is_empty() {
        return Err(SchemaError::EmptyColumnId { position });
    }
    Ok(id)
}
