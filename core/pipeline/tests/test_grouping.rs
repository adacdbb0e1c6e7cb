//! FILENAME: core/pipeline/tests/test_grouping.rs
//! PURPOSE: Grouping and aggregation through the table surface.

mod common;

use std::collections::HashSet;

use common::{assert_number, SalesFixture, TestHarness};
use rowtree::{
    Action, AggregateError, ChainMode, ColumnSpec, GroupKey, Registries, RowPath, Table,
    TableError, TableOptions, Value,
};
use rowtree_model::leaf_rows;
use serde_json::json;

fn text(s: &str) -> GroupKey {
    GroupKey::Text(s.to_string())
}

// ============================================================================
// PARTITIONING
// ============================================================================

#[test]
fn test_groups_appear_in_first_seen_order() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    assert_eq!(harness.root_values("region"), vec!["North", "South", "East"]);

    harness.dispatch(Action::toggle_group_by("product"));
    let north = &harness.model().pre_expanded_rows[0];
    let products: Vec<_> = north.sub_rows.iter().map(|r| r.value("product").display_value()).collect();
    assert_eq!(products, vec!["Widget", "Gadget"]);
}

#[test]
fn test_nested_groups_partition_the_leaves() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    harness.dispatch(Action::toggle_group_by("product"));
    let model = harness.model();

    let leaves = leaf_rows(&model.pre_expanded_rows);
    assert_eq!(leaves.len(), 12);
    let distinct: HashSet<_> = leaves.iter().map(|r| r.path.clone()).collect();
    assert_eq!(distinct.len(), 12);
    // every leaf equals one materialized row apart from depth
    for leaf in &leaves {
        let source = model
            .pre_grouped_rows
            .iter()
            .find(|r| r.path == leaf.path)
            .unwrap();
        assert_eq!(leaf.depth, 2);
        assert_eq!(leaf.values, source.values);
    }

    let groups: Vec<_> = model.flat_rows.iter().filter(|r| r.is_grouped).collect();
    assert_eq!(groups.len(), 9);
    for group in groups {
        let key = group.grouped_column_id.as_deref().unwrap();
        let value = group.grouped_value.as_ref().unwrap();
        assert!(leaf_rows(&group.sub_rows)
            .iter()
            .all(|leaf| leaf.value(key) == value));
    }
}

#[test]
fn test_group_paths_name_the_keys() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    harness.dispatch(Action::toggle_group_by("product"));
    let south_gadget = &harness.model().pre_expanded_rows[1].sub_rows[1];

    let expected = RowPath::root()
        .child_group("region", text("South"))
        .child_group("product", text("Gadget"));
    assert_eq!(south_gadget.path, expected);
    assert_eq!(south_gadget.leaf_count, 2);
    assert_eq!(south_gadget.depth, 1);
    assert_eq!(south_gadget.value("region"), &Value::text("South"));
}

#[test]
fn test_filtered_groups_recount_members() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    harness.dispatch(Action::toggle_group_by("product"));
    harness.dispatch(Action::set_filter("quarter", json!("q1")));
    let north = &harness.model().pre_expanded_rows[0];

    assert_eq!(north.leaf_count, 2);
    for product in &north.sub_rows {
        assert_eq!(product.sub_rows.len(), 1);
        assert_eq!(product.leaf_count, 1);
    }
    assert_eq!(leaf_rows(&north.sub_rows).len(), north.leaf_count);
}

#[test]
fn test_toggle_group_by_explicit_value() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::ToggleGroupBy {
        column_id: "region".to_string(),
        value: Some(true),
    });
    harness.dispatch(Action::ToggleGroupBy {
        column_id: "region".to_string(),
        value: Some(true),
    });
    assert_eq!(harness.table.state().group_by, vec!["region".to_string()]);

    let model = harness.dispatch(Action::ToggleGroupBy {
        column_id: "region".to_string(),
        value: Some(false),
    });
    assert_eq!(model.rows.len(), 12);
    assert!(model.column("region").unwrap().is_visible);
}

// ============================================================================
// AGGREGATION
// ============================================================================

#[test]
fn test_sum_aggregates_per_group() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    let roots = &harness.model().pre_expanded_rows;

    assert_number(roots[0].value("sales"), 39000.0);
    assert_number(roots[1].value("sales"), 53000.0);
    assert_number(roots[2].value("sales"), 35500.0);
    // columns without an aggregate stay undefined on group rows
    assert!(roots[0].value("quarter").is_undefined());
}

#[test]
fn test_two_stage_count_then_sum() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("region"));
    harness.dispatch(Action::toggle_group_by("product"));
    let roots = harness.model().pre_expanded_rows.clone();

    for region in roots.iter() {
        assert_number(region.value("quantity"), 4.0);
        for product in &region.sub_rows {
            assert_number(product.value("quantity"), 2.0);
        }
    }
    let total: f64 = roots
        .iter()
        .filter_map(|r| r.value("quantity").as_f64())
        .sum();
    assert_eq!(total, 12.0);
}

#[test]
fn test_leaf_values_chain_mode() {
    let options = TableOptions {
        chain_mode: ChainMode::LeafValues,
        ..Default::default()
    };
    let mut harness = TestHarness::with_sales_options(options);
    harness.dispatch(Action::toggle_group_by("region"));
    harness.dispatch(Action::toggle_group_by("product"));
    let north = &harness.model().pre_expanded_rows[0];

    // the parent stage sums the raw quantities instead of the child counts
    assert_number(north.value("quantity"), 390.0);
    assert_number(north.sub_rows[0].value("quantity"), 2.0);
}

#[test]
fn test_single_level_two_stage_uses_leaf_stage() {
    let mut harness = TestHarness::with_sales();
    harness.dispatch(Action::toggle_group_by("product"));
    let roots = &harness.model().pre_expanded_rows;
    assert_number(roots[0].value("quantity"), 6.0);
    assert_number(roots[1].value("quantity"), 6.0);
}

#[test]
fn test_grouped_column_keeps_group_value() {
    let columns = vec![
        ColumnSpec::accessor("region").aggregate("count"),
        ColumnSpec::accessor("sales").aggregate("average"),
    ];
    let mut harness = TestHarness::new(columns, SalesFixture::data());
    harness.dispatch(Action::toggle_group_by("region"));
    let east = &harness.model().pre_expanded_rows[2];
    assert_eq!(east.value("region"), &Value::text("East"));
    assert_number(east.value("sales"), 8875.0);
}

#[test]
fn test_registry_aggregation() {
    let registries = Registries::new().with_aggregation("range", |values, _rows| {
        let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
        let max = numbers.iter().cloned().fold(f64::MIN, f64::max);
        let min = numbers.iter().cloned().fold(f64::MAX, f64::min);
        Ok(Value::Number(max - min))
    });
    let columns = vec![
        ColumnSpec::accessor("region"),
        ColumnSpec::accessor("sales").aggregate("range"),
    ];
    let mut table = Table::builder(columns, SalesFixture::data())
        .registries(registries)
        .build()
        .unwrap();
    let model = table.dispatch(Action::toggle_group_by("region")).unwrap();
    assert_number(model.pre_expanded_rows[0].value("sales"), 4000.0);
}

#[test]
fn test_failing_aggregation_names_the_column() {
    let registries = Registries::new()
        .with_aggregation("strict", |_, _| Err(AggregateError::new("no numbers")));
    let columns = vec![
        ColumnSpec::accessor("region"),
        ColumnSpec::accessor("sales").aggregate("strict"),
    ];
    let mut table = Table::builder(columns, SalesFixture::data())
        .registries(registries)
        .build()
        .unwrap();

    let err = table.dispatch(Action::toggle_group_by("region")).unwrap_err();
    assert_eq!(
        err,
        TableError::Aggregate {
            column_id: "sales".to_string(),
            source: AggregateError::new("no numbers"),
        }
    );
    assert!(table.state().group_by.is_empty());
    assert_eq!(table.row_model().unwrap().rows.len(), 12);
}

#[test]
fn test_group_by_unknown_column_is_rejected() {
    let mut harness = TestHarness::with_sales();
    let err = harness
        .table
        .dispatch(Action::toggle_group_by("channel"))
        .unwrap_err();
    assert!(matches!(err, TableError::Schema(_)));
    assert!(harness.table.state().group_by.is_empty());
}

#[test]
fn test_group_by_json_values() {
    let columns = vec![
        ColumnSpec::accessor("kind"),
        ColumnSpec::accessor("n").aggregate("sum"),
    ];
    let data = vec![
        json!({"kind": 1, "n": 1}),
        json!({"kind": null, "n": 2}),
        json!({"kind": 1.0, "n": 3}),
        json!({"n": 4}),
    ];
    let mut harness = TestHarness::new(columns, data);
    let model = harness.dispatch(Action::toggle_group_by("kind"));
    // 1 and 1.0 share a group; null and a missing value do not
    assert_eq!(model.rows.len(), 3);
    assert_number(model.pre_expanded_rows[0].value("n"), 4.0);
}
