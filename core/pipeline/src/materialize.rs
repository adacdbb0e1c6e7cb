//! FILENAME: core/pipeline/src/materialize.rs
//! PURPOSE: Builds the base row tree from source records.
//! CONTEXT: First pipeline stage. Every leaf column is resolved for every
//! record, recursively through sub-record lists. Nothing is filtered or
//! reordered here.

use std::sync::Arc;

use rowtree_model::{sub_records, Record, Row, RowPath, RowRef, RowValues};

use crate::columns::{AccessorContext, ColumnSet};

/// Materializes `data` into root rows. Sub-records under `sub_rows_key` become `sub_rows`.
pub fn materialize_rows(data: &[Arc<Record>], columns: &ColumnSet, sub_rows_key: &str) -> Vec<RowRef> {
    let mut ancestors = Vec::new();
    materialize_level(data, columns, sub_rows_key, &RowPath::root(), 0, &mut ancestors)
}

fn materialize_level(
    records: &[Arc<Record>],
    columns: &ColumnSet,
    sub_rows_key: &str,
    parent_path: &RowPath,
    depth: usize,
    ancestors: &mut Vec<Arc<Record>>,
) -> Vec<RowRef> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let path = parent_path.child_index(index);

            let values: RowValues = {
                let ctx = AccessorContext {
                    index,
                    depth,
                    ancestors: ancestors.as_slice(),
                };
                columns
                    .iter()
                    .map(|column| (column.id.clone(), column.resolve(record, &ctx)))
                    .collect()
            };

            let sub_rows = match sub_records(record, sub_rows_key) {
                Some(children) if !children.is_empty() => {
                    let children: Vec<Arc<Record>> =
                        children.iter().cloned().map(Arc::new).collect();
                    ancestors.push(Arc::clone(record));
                    let rows = materialize_level(
                        &children,
                        columns,
                        sub_rows_key,
                        &path,
                        depth + 1,
                        ancestors,
                    );
                    ancestors.pop();
                    rows
                }
                _ => Vec::new(),
            };

            Arc::new(Row::new(
                index,
                path,
                depth,
                Arc::clone(record),
                values,
                sub_rows,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{resolve_columns, ColumnSpec};
    use rowtree_model::Value;
    use serde_json::json;

    fn data(records: Vec<Record>) -> Vec<Arc<Record>> {
        records.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn test_one_row_per_record_with_every_column() {
        let columns =
            resolve_columns(&[ColumnSpec::accessor("a"), ColumnSpec::accessor("b.c")]).unwrap();
        let rows = materialize_rows(
            &data(vec![json!({"a": 1, "b": {"c": "x"}}), json!({"a": 2})]),
            &columns,
            "subRows",
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.values.len() == 2));
        assert_eq!(rows[1].value("b.c"), &Value::Undefined);
        assert_eq!(rows[1].path, RowPath::from_indices(&[1]));
        assert_eq!(rows[1].index, 1);
    }

    #[test]
    fn test_sub_records_recurse_with_depth_and_path() {
        let columns = resolve_columns(&[ColumnSpec::accessor("name")]).unwrap();
        let rows = materialize_rows(
            &data(vec![json!({
                "name": "root",
                "subRows": [{"name": "c0"}, {"name": "c1", "subRows": [{"name": "g0"}]}]
            })]),
            &columns,
            "subRows",
        );
        let grandchild = &rows[0].sub_rows[1].sub_rows[0];
        assert_eq!(grandchild.value("name"), &Value::text("g0"));
        assert_eq!(grandchild.depth, 2);
        assert_eq!(grandchild.path, RowPath::from_indices(&[0, 1, 0]));
        assert!(grandchild.original.is_some());
    }

    #[test]
    fn test_custom_sub_rows_key() {
        let columns = resolve_columns(&[ColumnSpec::accessor("name")]).unwrap();
        let rows = materialize_rows(
            &data(vec![json!({"name": "p", "children": [{"name": "c"}]})]),
            &columns,
            "children",
        );
        assert_eq!(rows[0].sub_rows.len(), 1);
    }

    #[test]
    fn test_accessors_see_index_and_ancestors() {
        let columns = resolve_columns(&[ColumnSpec::computed("trail", |record, ctx| {
            let mut names: Vec<String> = ctx
                .ancestors
                .iter()
                .map(|a| a["name"].as_str().unwrap_or_default().to_string())
                .collect();
            names.push(format!("{}#{}", record["name"].as_str().unwrap_or_default(), ctx.index));
            Value::text(names.join("/"))
        })])
        .unwrap();
        let rows = materialize_rows(
            &data(vec![json!({"name": "p", "subRows": [{"name": "a"}, {"name": "b"}]})]),
            &columns,
            "subRows",
        );
        assert_eq!(rows[0].value("trail"), &Value::text("p#0"));
        assert_eq!(rows[0].sub_rows[1].value("trail"), &Value::text("p/b#1"));
    }
}
