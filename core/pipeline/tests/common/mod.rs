//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for rowtree integration tests.

#![allow(dead_code)]

use rowtree::{
    Action, Aggregate, ColumnSpec, Record, RowModel, Table, TableOptions, TableState, Value,
};
use serde_json::json;

/// Test harness wrapping a `Table`.
pub struct TestHarness {
    pub table: Table,
}

impl TestHarness {
    pub fn new(columns: Vec<ColumnSpec>, data: Vec<Record>) -> Self {
        TestHarness {
            table: Table::new(columns, data).expect("table should build"),
        }
    }

    pub fn with_options(columns: Vec<ColumnSpec>, data: Vec<Record>, options: TableOptions) -> Self {
        TestHarness {
            table: Table::builder(columns, data)
                .options(options)
                .build()
                .expect("table should build"),
        }
    }

    pub fn with_state(
        columns: Vec<ColumnSpec>,
        data: Vec<Record>,
        options: TableOptions,
        state: TableState,
    ) -> Self {
        TestHarness {
            table: Table::builder(columns, data)
                .options(options)
                .initial_state(state)
                .build()
                .expect("table should build"),
        }
    }

    /// Sample people data (5 records).
    pub fn with_people() -> Self {
        Self::new(PeopleFixture::columns(), PeopleFixture::data())
    }

    /// Sample sales data (12 records).
    pub fn with_sales() -> Self {
        Self::new(SalesFixture::columns(), SalesFixture::data())
    }

    pub fn with_sales_options(options: TableOptions) -> Self {
        Self::with_options(SalesFixture::columns(), SalesFixture::data(), options)
    }

    /// Nested task data with sub rows.
    pub fn with_tasks() -> Self {
        Self::new(TaskFixture::columns(), TaskFixture::data())
    }

    pub fn dispatch(&mut self, action: Action) -> &RowModel {
        self.table.dispatch(action).expect("action should succeed")
    }

    pub fn model(&self) -> &RowModel {
        self.table.row_model().expect("a row model should exist")
    }

    /// Display values of `column_id` for the visible rows, in order.
    pub fn column_values(&self, column_id: &str) -> Vec<String> {
        self.model()
            .visible_rows()
            .map(|e| e.row.value(column_id).display_value())
            .collect()
    }

    /// Display values of `column_id` for the root rows of the final tree.
    pub fn root_values(&self, column_id: &str) -> Vec<String> {
        self.model()
            .pre_expanded_rows
            .iter()
            .map(|r| r.value(column_id).display_value())
            .collect()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub struct PeopleFixture;

impl PeopleFixture {
    pub fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::accessor("name"),
            ColumnSpec::accessor("age").filter("compare").sort_type("number"),
            ColumnSpec::accessor("city"),
        ]
    }

    pub fn data() -> Vec<Record> {
        vec![
            json!({"name": "Alice", "age": 30, "city": "New York"}),
            json!({"name": "Bob", "age": 25, "city": "Los Angeles"}),
            json!({"name": "Charlie", "age": 35, "city": "Chicago"}),
            json!({"name": "Diana", "age": 28, "city": "Houston"}),
            json!({"name": "Eve", "age": 32, "city": "Phoenix"}),
        ]
    }
}

pub struct SalesFixture;

impl SalesFixture {
    pub fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::accessor("region"),
            ColumnSpec::accessor("product"),
            ColumnSpec::accessor("quarter"),
            ColumnSpec::accessor("sales").aggregate("sum"),
            ColumnSpec::accessor("quantity").aggregate(Aggregate::two_stage("count", "sum")),
        ]
    }

    pub fn data() -> Vec<Record> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
        .into_iter()
        .map(|(region, product, quarter, sales, quantity)| {
            json!({
                "region": region,
                "product": product,
                "quarter": quarter,
                "sales": sales,
                "quantity": quantity,
            })
        })
        .collect()
    }
}

pub struct TaskFixture;

impl TaskFixture {
    pub fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::accessor("title"),
            ColumnSpec::accessor("owner"),
            ColumnSpec::accessor("hours").sort_type("number"),
        ]
    }

    pub fn data() -> Vec<Record> {
        vec![
            json!({
                "title": "Release",
                "owner": "ana",
                "hours": 3,
                "subRows": [
                    {"title": "Changelog", "owner": "ben", "hours": 1},
                    {"title": "Tag", "owner": "ana", "hours": 2, "subRows": [
                        {"title": "Sign", "owner": "cy", "hours": 1}
                    ]}
                ]
            }),
            json!({"title": "Docs", "owner": "ben", "hours": 5}),
            json!({
                "title": "Audit",
                "owner": "cy",
                "hours": 8,
                "subRows": [{"title": "Report", "owner": "cy", "hours": 4}]
            }),
        ]
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that a row value is an expected number.
pub fn assert_number(value: &Value, expected: f64) {
    match value {
        Value::Number(n) => assert!(
            (n - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            n
        ),
        other => panic!("expected number {}, got {:?}", expected, other),
    }
}
