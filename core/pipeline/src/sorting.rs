//! FILENAME: core/pipeline/src/sorting.rs
//! PURPOSE: Stable multi-key ordering of sibling rows at every tree level.

use std::cmp::Ordering;
use std::sync::Arc;

use rowtree_model::RowRef;

use crate::columns::ColumnSet;
use crate::error::TableResult;
use crate::options::Registries;
use crate::sort_types::{resolve_sort_type, SortFn};
use crate::state::SortingRule;

struct SortKey {
    column_id: String,
    compare: SortFn,
    desc: bool,
}

/// Sorts every sibling list of the tree by `sort_by`.
/// Keys compose lexicographically; rows tied on every key keep their order.
pub fn sort_rows(
    rows: &[RowRef],
    sort_by: &[SortingRule],
    columns: &ColumnSet,
    registries: &Registries,
) -> TableResult<Vec<RowRef>> {
    if sort_by.is_empty() {
        return Ok(rows.to_vec());
    }

    let mut keys = Vec::with_capacity(sort_by.len());
    for rule in sort_by {
        let column = columns.require(&rule.id, "sorting rows")?;
        keys.push(SortKey {
            column_id: column.id.clone(),
            compare: resolve_sort_type(&column.id, &column.sort_type, registries)?,
            // sort_inverted flips the meaning of desc for this column
            desc: rule.desc != column.sort_inverted,
        });
    }

    Ok(sort_level(rows, &keys))
}

fn compare_rows(a: &RowRef, b: &RowRef, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ord = (key.compare)(a, b, &key.column_id);
        let ord = if key.desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn sort_level(rows: &[RowRef], keys: &[SortKey]) -> Vec<RowRef> {
    let mut sorted: Vec<RowRef> = rows
        .iter()
        .map(|row| {
            if !row.has_sub_rows() {
                return Arc::clone(row);
            }
            let children = sort_level(&row.sub_rows, keys);
            if same_rows(&children, &row.sub_rows) {
                Arc::clone(row)
            } else {
                Arc::new(row.with_sub_rows(children))
            }
        })
        .collect();
    // slice::sort_by is stable
    sorted.sort_by(|a, b| compare_rows(a, b, keys));
    sorted
}

/// True when both lists hold the same nodes in the same order.
fn same_rows(a: &[RowRef], b: &[RowRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}
