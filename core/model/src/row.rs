//! FILENAME: core/model/src/row.rs
//! PURPOSE: The node type of every row tree produced by the pipeline.
//! CONTEXT: Rows are immutable once built. A stage that needs a different
//! child list builds a new node with `with_sub_rows`, sharing the values map
//! and the untouched children through `Arc`.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::path::RowPath;
use crate::record::Record;
use crate::value::Value;

/// Column id -> resolved value.
pub type RowValues = FxHashMap<String, Value>;

/// A shared row node.
pub type RowRef = Arc<Row>;

/// A shared sibling list; stage outputs are compared by pointer identity.
pub type Rows = Arc<Vec<RowRef>>;

static UNDEFINED: Value = Value::Undefined;

/// One node of a derived row tree (a materialized record or a synthetic group).
#[derive(Debug, Clone)]
pub struct Row {
    /// Position among siblings at materialization (group rows: position among groups).
    pub index: usize,

    /// Stable identity from the root.
    pub path: RowPath,

    /// Nesting depth, 0 at the root level.
    pub depth: usize,

    /// The source record; `None` for group rows.
    pub original: Option<Arc<Record>>,

    pub values: Arc<RowValues>,

    pub sub_rows: Vec<RowRef>,

    pub is_grouped: bool,
    pub is_aggregated: bool,
    pub grouped_column_id: Option<String>,
    pub grouped_value: Option<Value>,

    /// Number of leaf rows under a group row, recounted when filtering prunes
    /// its children (1 for a materialized row).
    pub leaf_count: usize,
}

impl Row {
    /// Creates a materialized row for a source record.
    pub fn new(
        index: usize,
        path: RowPath,
        depth: usize,
        original: Arc<Record>,
        values: RowValues,
        sub_rows: Vec<RowRef>,
    ) -> Self {
        Row {
            index,
            path,
            depth,
            original: Some(original),
            values: Arc::new(values),
            sub_rows,
            is_grouped: false,
            is_aggregated: false,
            grouped_column_id: None,
            grouped_value: None,
            leaf_count: 1,
        }
    }

    /// Returns the value for a column, `Undefined` when the column is unknown.
    pub fn value(&self, column_id: &str) -> &Value {
        self.values.get(column_id).unwrap_or(&UNDEFINED)
    }

    pub fn has_sub_rows(&self) -> bool {
        !self.sub_rows.is_empty()
    }

    /// A copy of this node with a different child list. Values are shared.
    pub fn with_sub_rows(&self, sub_rows: Vec<RowRef>) -> Row {
        Row {
            sub_rows,
            ..self.clone_shallow()
        }
    }

    /// Clones every field but the child list, which is left empty.
    fn clone_shallow(&self) -> Row {
        Row {
            index: self.index,
            path: self.path.clone(),
            depth: self.depth,
            original: self.original.clone(),
            values: Arc::clone(&self.values),
            sub_rows: Vec::new(),
            is_grouped: self.is_grouped,
            is_aggregated: self.is_aggregated,
            grouped_column_id: self.grouped_column_id.clone(),
            grouped_value: self.grouped_value.clone(),
            leaf_count: self.leaf_count,
        }
    }

    /// Returns this subtree with every depth shifted by `offset`.
    /// Subtrees are shared when the offset is zero.
    pub fn shift_depth(row: &RowRef, offset: usize) -> RowRef {
        if offset == 0 {
            return Arc::clone(row);
        }
        let sub_rows = row
            .sub_rows
            .iter()
            .map(|child| Row::shift_depth(child, offset))
            .collect();
        let mut shifted = row.with_sub_rows(sub_rows);
        shifted.depth += offset;
        Arc::new(shifted)
    }
}

/// Depth-first pre-order list of every row in the given forest.
pub fn flatten_rows(rows: &[RowRef]) -> Vec<RowRef> {
    let mut out = Vec::new();
    fn walk(rows: &[RowRef], out: &mut Vec<RowRef>) {
        for row in rows {
            out.push(Arc::clone(row));
            walk(&row.sub_rows, out);
        }
    }
    walk(rows, &mut out);
    out
}

/// Non-group rows reachable through group rows, i.e. the members grouping was applied to.
pub fn leaf_rows(rows: &[RowRef]) -> Vec<RowRef> {
    let mut out = Vec::new();
    fn walk(rows: &[RowRef], out: &mut Vec<RowRef>) {
        for row in rows {
            if row.is_grouped {
                walk(&row.sub_rows, out);
            } else {
                out.push(Arc::clone(row));
            }
        }
    }
    walk(rows, &mut out);
    out
}
