//! FILENAME: core/pipeline/src/grouping.rs
//! PURPOSE: Groups rows by an ordered list of column keys and aggregates each group.
//! CONTEXT: Runs on the materialized root rows. Each grouping level partitions
//! its input by one column in first-seen order and synthesizes a parent row per
//! partition. Leaves keep their paths; their depth moves below the group levels.

use std::sync::Arc;

use rowtree_model::{GroupKey, Row, RowPath, RowRef, RowValues, Value};
use rustc_hash::FxHashMap;

use crate::aggregation::{resolve_aggregate, ChainMode, ResolvedAggregate};
use crate::columns::ColumnSet;
use crate::error::{TableError, TableResult};
use crate::options::Registries;

/// Groups `rows` by `group_by`. An empty key list returns the rows unchanged.
pub fn group_rows(
    rows: &[RowRef],
    group_by: &[String],
    columns: &ColumnSet,
    registries: &Registries,
    chain_mode: ChainMode,
) -> TableResult<Vec<RowRef>> {
    if group_by.is_empty() {
        return Ok(rows.to_vec());
    }
    for id in group_by {
        columns.require(id, "grouping rows")?;
    }

    let mut aggregates = Vec::new();
    for column in columns.iter() {
        if let Some(aggregate) = &column.aggregate {
            aggregates.push((
                column.id.clone(),
                resolve_aggregate(&column.id, aggregate, registries)?,
            ));
        }
    }

    let grouper = Grouper {
        group_by,
        aggregates,
        chain_mode,
    };
    let mut keys = Vec::with_capacity(group_by.len());
    grouper.build_level(rows, 0, &RowPath::root(), &mut keys)
}

/// Splits rows into partitions by the value of `column_id`, in first-seen order.
pub fn partition_rows(rows: &[RowRef], column_id: &str) -> Vec<(GroupKey, Vec<RowRef>)> {
    let mut index: FxHashMap<GroupKey, usize> = FxHashMap::default();
    let mut partitions: Vec<(GroupKey, Vec<RowRef>)> = Vec::new();
    for row in rows {
        let key = row.value(column_id).group_key();
        match index.get(&key) {
            Some(&i) => partitions[i].1.push(Arc::clone(row)),
            None => {
                index.insert(key.clone(), partitions.len());
                partitions.push((key, vec![Arc::clone(row)]));
            }
        }
    }
    partitions
}

struct Grouper<'a> {
    group_by: &'a [String],
    aggregates: Vec<(String, ResolvedAggregate)>,
    chain_mode: ChainMode,
}

impl<'a> Grouper<'a> {
    /// `keys` holds the grouped column/value pairs of the enclosing levels.
    fn build_level(
        &self,
        rows: &[RowRef],
        level: usize,
        parent_path: &RowPath,
        keys: &mut Vec<(String, Value)>,
    ) -> TableResult<Vec<RowRef>> {
        let column_id = &self.group_by[level];
        let is_last_level = level + 1 == self.group_by.len();

        let partitions = partition_rows(rows, column_id);
        let mut groups = Vec::with_capacity(partitions.len());

        for (index, (key, members)) in partitions.into_iter().enumerate() {
            let path = parent_path.child_group(column_id, key.clone());
            let grouped_value = key.to_value();
            keys.push((column_id.clone(), grouped_value.clone()));

            let sub_rows = if is_last_level {
                members
                    .iter()
                    .map(|row| Row::shift_depth(row, self.group_by.len()))
                    .collect()
            } else {
                self.build_level(&members, level + 1, &path, keys)?
            };

            let values = self.aggregate_values(&members, &sub_rows, is_last_level, keys)?;
            keys.pop();

            groups.push(Arc::new(Row {
                index,
                path,
                depth: level,
                original: None,
                values: Arc::new(values),
                sub_rows,
                is_grouped: true,
                is_aggregated: true,
                grouped_column_id: Some(column_id.clone()),
                grouped_value: Some(grouped_value),
                leaf_count: members.len(),
            }));
        }

        Ok(groups)
    }

    fn aggregate_values(
        &self,
        members: &[RowRef],
        sub_rows: &[RowRef],
        is_last_level: bool,
        keys: &[(String, Value)],
    ) -> TableResult<RowValues> {
        let mut values = RowValues::default();
        for (column_id, value) in keys {
            values.insert(column_id.clone(), value.clone());
        }

        for (column_id, aggregate) in &self.aggregates {
            if values.contains_key(column_id) {
                continue;
            }
            let leaf_values: Vec<Value> =
                members.iter().map(|r| r.value(column_id).clone()).collect();

            let result = match aggregate {
                ResolvedAggregate::Single(f) => f(&leaf_values, members),
                ResolvedAggregate::TwoStage { leaf, .. } if is_last_level => {
                    leaf(&leaf_values, members)
                }
                ResolvedAggregate::TwoStage { parent, .. } => match self.chain_mode {
                    ChainMode::Cumulative => {
                        let child_values: Vec<Value> =
                            sub_rows.iter().map(|r| r.value(column_id).clone()).collect();
                        parent(&child_values, sub_rows)
                    }
                    ChainMode::LeafValues => parent(&leaf_values, members),
                },
            };

            let value = result.map_err(|source| TableError::Aggregate {
                column_id: column_id.clone(),
                source,
            })?;
            values.insert(column_id.clone(), value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Aggregate;
    use crate::columns::{resolve_columns, ColumnSpec};
    use crate::error::{AggregateError, ConfigurationError, SchemaError};
    use crate::materialize::materialize_rows;
    use rowtree_model::{leaf_rows, PathSegment, Record};
    use serde_json::json;

    fn fixture() -> (ColumnSet, Vec<RowRef>) {
        let columns = resolve_columns(&[
            ColumnSpec::accessor("region"),
            ColumnSpec::accessor("team"),
            ColumnSpec::accessor("score").aggregate(Aggregate::two_stage("count", "sum")),
            ColumnSpec::accessor("name"),
        ])
        .unwrap();
        let data: Vec<Arc<Record>> = vec![
            json!({"region": "north", "team": "a", "score": 1, "name": "p0"}),
            json!({"region": "south", "team": "a", "score": 2, "name": "p1"}),
            json!({"region": "north", "team": "b", "score": 3, "name": "p2"}),
            json!({"region": "north", "team": "a", "score": 4, "name": "p3"}),
            json!({"region": "south", "team": "b", "score": 5, "name": "p4"}),
        ]
        .into_iter()
        .map(Arc::new)
        .collect();
        let rows = materialize_rows(&data, &columns, "subRows");
        (columns, rows)
    }

    fn ids(group_by: &[&str]) -> Vec<String> {
        group_by.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_partitions_in_first_seen_order() {
        let (columns, rows) = fixture();
        let grouped =
            group_rows(&rows, &ids(&["region"]), &columns, &Registries::new(), ChainMode::Cumulative)
                .unwrap();
        let labels: Vec<_> = grouped.iter().map(|g| g.value("region").display_value()).collect();
        assert_eq!(labels, vec!["north", "south"]);
        assert_eq!(grouped[0].leaf_count, 3);
        assert_eq!(grouped[0].grouped_column_id.as_deref(), Some("region"));
        assert!(grouped[0].is_grouped && grouped[0].is_aggregated);
        assert_eq!(grouped[0].value("name"), &Value::Undefined);
    }

    #[test]
    fn test_leaves_are_the_input_exactly() {
        let (columns, rows) = fixture();
        let grouped = group_rows(
            &rows,
            &ids(&["region", "team"]),
            &columns,
            &Registries::new(),
            ChainMode::Cumulative,
        )
        .unwrap();
        let mut leaves: Vec<_> = leaf_rows(&grouped).iter().map(|r| r.path.clone()).collect();
        leaves.sort_by_key(|p| match p.segments() {
            [PathSegment::Index(i)] => *i,
            _ => usize::MAX,
        });
        let expected: Vec<_> = rows.iter().map(|r| r.path.clone()).collect();
        assert_eq!(leaves, expected);
        assert!(leaf_rows(&grouped).iter().all(|r| r.depth == 2));
    }

    #[test]
    fn test_group_paths_and_depths() {
        let (columns, rows) = fixture();
        let grouped = group_rows(
            &rows,
            &ids(&["region", "team"]),
            &columns,
            &Registries::new(),
            ChainMode::Cumulative,
        )
        .unwrap();
        let north_b = &grouped[0].sub_rows[1];
        assert_eq!(north_b.path.to_string(), "region:north.team:b");
        assert_eq!(north_b.depth, 1);
        assert_eq!(north_b.value("region"), &Value::text("north"));
        assert_eq!(north_b.value("team"), &Value::text("b"));
        assert_eq!(grouped[0].value("team"), &Value::Undefined);
    }

    #[test]
    fn test_two_stage_cumulative_counts_leaves() {
        let (columns, rows) = fixture();
        let grouped = group_rows(
            &rows,
            &ids(&["region", "team"]),
            &columns,
            &Registries::new(),
            ChainMode::Cumulative,
        )
        .unwrap();
        // count at the team level, sum of counts at the region level
        assert_eq!(grouped[0].sub_rows[0].value("score"), &Value::Number(2.0));
        assert_eq!(grouped[0].value("score"), &Value::Number(3.0));
        assert_eq!(grouped[1].value("score"), &Value::Number(2.0));
    }

    #[test]
    fn test_two_stage_leaf_values_mode() {
        let (columns, rows) = fixture();
        let grouped = group_rows(
            &rows,
            &ids(&["region", "team"]),
            &columns,
            &Registries::new(),
            ChainMode::LeafValues,
        )
        .unwrap();
        // sum of the raw scores 1 + 3 + 4 at the region level
        assert_eq!(grouped[0].value("score"), &Value::Number(8.0));
        assert_eq!(grouped[0].sub_rows[0].value("score"), &Value::Number(2.0));
    }

    #[test]
    fn test_unknown_group_column_is_schema_error() {
        let (columns, rows) = fixture();
        let err = group_rows(&rows, &ids(&["nope"]), &columns, &Registries::new(), ChainMode::Cumulative)
            .unwrap_err();
        assert_eq!(err, TableError::Schema(SchemaError::unknown_column("nope", "grouping rows")));
    }

    #[test]
    fn test_unknown_aggregation_is_configuration_error() {
        let columns =
            resolve_columns(&[ColumnSpec::accessor("a"), ColumnSpec::accessor("b").aggregate("mode")])
                .unwrap();
        let err = group_rows(&[], &ids(&["a"]), &columns, &Registries::new(), ChainMode::Cumulative)
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::Configuration(ConfigurationError::UnknownAggregation { .. })
        ));
    }

    #[test]
    fn test_aggregate_failure_propagates() {
        let columns = resolve_columns(&[
            ColumnSpec::accessor("region"),
            ColumnSpec::accessor("score").aggregate(crate::aggregation::Aggregator::custom(
                |_: &[Value], _: &[RowRef]| Err(AggregateError::new("boom")),
            )),
        ])
        .unwrap();
        let (_, rows) = fixture();
        let err = group_rows(&rows, &ids(&["region"]), &columns, &Registries::new(), ChainMode::Cumulative)
            .unwrap_err();
        assert_eq!(
            err,
            TableError::Aggregate {
                column_id: "score".to_string(),
                source: AggregateError::new("boom")
            }
        );
    }
}
