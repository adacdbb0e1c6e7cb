//! FILENAME: core/pipeline/src/expanded.rs
//! PURPOSE: Flattens the sorted tree into the visible row sequence.
//! CONTEXT: Last pipeline stage. A row appears when every ancestor is
//! expanded. With `paginate_expanded_rows` off, descendants of collapsed rows
//! stay in the sequence marked invisible.

use std::sync::Arc;

use rowtree_model::RowRef;

use crate::state::ExpandedState;

/// One entry of the flattened output.
#[derive(Debug, Clone)]
pub struct ExpandedRow {
    pub row: RowRef,
    pub depth: usize,
    pub is_expanded: bool,
    pub can_expand: bool,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExpandOutput {
    pub rows: Arc<Vec<ExpandedRow>>,
    pub expanded_depth: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions {
    pub paginate_expanded_rows: bool,
    pub expand_sub_rows: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        ExpandOptions {
            paginate_expanded_rows: true,
            expand_sub_rows: true,
        }
    }
}

/// Rows with children can expand; natural sub-rows only when `expand_sub_rows` is set.
pub fn can_expand(row: &RowRef, options: &ExpandOptions) -> bool {
    row.has_sub_rows() && (row.is_grouped || options.expand_sub_rows)
}

pub fn expand_rows(rows: &[RowRef], expanded: &ExpandedState, options: &ExpandOptions) -> ExpandOutput {
    let mut out = Vec::with_capacity(rows.len());
    let mut deepest_expanded = 0;
    walk(rows, expanded, options, true, &mut out, &mut deepest_expanded);

    let expanded_depth = if expanded.is_all() {
        deepest_expanded
    } else {
        expanded.paths().map(|p| p.len()).max().unwrap_or(0)
    };

    ExpandOutput {
        rows: Arc::new(out),
        expanded_depth,
    }
}

fn walk(
    rows: &[RowRef],
    expanded: &ExpandedState,
    options: &ExpandOptions,
    visible: bool,
    out: &mut Vec<ExpandedRow>,
    deepest_expanded: &mut usize,
) {
    for row in rows {
        let can_expand = can_expand(row, options);
        let is_expanded = can_expand && expanded.is_expanded(&row.path);
        if is_expanded && visible {
            *deepest_expanded = (*deepest_expanded).max(row.path.len());
        }

        out.push(ExpandedRow {
            row: Arc::clone(row),
            depth: row.depth,
            is_expanded,
            can_expand,
            is_visible: visible,
        });

        if !row.has_sub_rows() {
            continue;
        }
        if is_expanded {
            walk(&row.sub_rows, expanded, options, visible, out, deepest_expanded);
        } else if !options.paginate_expanded_rows {
            walk(&row.sub_rows, expanded, options, false, out, deepest_expanded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{resolve_columns, ColumnSpec};
    use crate::materialize::materialize_rows;
    use rowtree_model::{Record, RowPath};
    use serde_json::json;

    fn tree() -> Vec<RowRef> {
        let columns = resolve_columns(&[ColumnSpec::accessor("name")]).unwrap();
        let data: Vec<Arc<Record>> = vec![
            json!({"name": "a", "subRows": [{"name": "a0", "subRows": [{"name": "a00"}]}, {"name": "a1"}]}),
            json!({"name": "b", "subRows": [{"name": "b0"}]}),
        ]
        .into_iter()
        .map(Arc::new)
        .collect();
        materialize_rows(&data, &columns, "subRows")
    }

    fn names(out: &ExpandOutput) -> Vec<String> {
        out.rows.iter().map(|e| e.row.value("name").display_value()).collect()
    }

    #[test]
    fn test_only_expanded_children_are_listed() {
        let expanded = ExpandedState::from_paths([RowPath::from_indices(&[0])]);
        let out = expand_rows(&tree(), &expanded, &ExpandOptions::default());
        assert_eq!(names(&out), vec!["a", "a0", "a1", "b"]);
        assert!(out.rows[0].is_expanded && out.rows[0].can_expand);
        assert!(out.rows[1].can_expand && !out.rows[1].is_expanded);
        assert_eq!(out.rows[1].depth, 1);
        assert_eq!(out.expanded_depth, 1);
    }

    #[test]
    fn test_unpaginated_descendants_are_marked_invisible() {
        let expanded = ExpandedState::from_paths([RowPath::from_indices(&[0])]);
        let options = ExpandOptions {
            paginate_expanded_rows: false,
            ..Default::default()
        };
        let out = expand_rows(&tree(), &expanded, &options);
        assert_eq!(names(&out), vec!["a", "a0", "a00", "a1", "b", "b0"]);
        let visible: Vec<bool> = out.rows.iter().map(|e| e.is_visible).collect();
        assert_eq!(visible, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_all_mode_with_exceptions() {
        let mut expanded = ExpandedState::all();
        expanded.toggle(&RowPath::from_indices(&[1]), Some(false));
        let out = expand_rows(&tree(), &expanded, &ExpandOptions::default());
        assert_eq!(names(&out), vec!["a", "a0", "a00", "a1", "b"]);
        assert_eq!(out.expanded_depth, 2);
    }

    #[test]
    fn test_natural_sub_rows_can_be_locked_collapsed() {
        let options = ExpandOptions {
            expand_sub_rows: false,
            ..Default::default()
        };
        let out = expand_rows(&tree(), &ExpandedState::all(), &options);
        assert_eq!(names(&out), vec!["a", "b"]);
        assert!(!out.rows[0].can_expand);
    }
}
