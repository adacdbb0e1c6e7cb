//! FILENAME: core/pipeline/src/aggregation.rs
//! PURPOSE: Column aggregators applied to group rows.
//! CONTEXT: A column's `aggregate` is either a single aggregator or a
//! two-stage pair. Named aggregators resolve against the user registry first,
//! then against the built-in `AggregationType` set.

use std::fmt;
use std::sync::Arc;

use rowtree_model::{compare_values, GroupKey, RowRef, Value};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, ConfigurationError};
use crate::options::Registries;

/// A user aggregate: column values of the group (and the rows they came from) -> one value.
pub type AggregateFn =
    Arc<dyn Fn(&[Value], &[RowRef]) -> Result<Value, AggregateError> + Send + Sync>;

// ============================================================================
// AGGREGATION TYPES
// ============================================================================

/// Built-in aggregation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationType {
    Sum,
    Min,
    Max,
    MinMax,
    Average,
    Median,
    Unique,
    UniqueCount,
    Count,
    CountNumbers,
    Product,
    StdDev,
    StdDevP,
    Var,
    VarP,
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::Sum
    }
}

impl AggregationType {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "sum" => AggregationType::Sum,
            "min" => AggregationType::Min,
            "max" => AggregationType::Max,
            "minMax" => AggregationType::MinMax,
            "average" => AggregationType::Average,
            "median" => AggregationType::Median,
            "unique" => AggregationType::Unique,
            "uniqueCount" => AggregationType::UniqueCount,
            "count" => AggregationType::Count,
            "countNumbers" => AggregationType::CountNumbers,
            "product" => AggregationType::Product,
            "stdDev" => AggregationType::StdDev,
            "stdDevP" => AggregationType::StdDevP,
            "var" => AggregationType::Var,
            "varP" => AggregationType::VarP,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregationType::Sum => "sum",
            AggregationType::Min => "min",
            AggregationType::Max => "max",
            AggregationType::MinMax => "minMax",
            AggregationType::Average => "average",
            AggregationType::Median => "median",
            AggregationType::Unique => "unique",
            AggregationType::UniqueCount => "uniqueCount",
            AggregationType::Count => "count",
            AggregationType::CountNumbers => "countNumbers",
            AggregationType::Product => "product",
            AggregationType::StdDev => "stdDev",
            AggregationType::StdDevP => "stdDevP",
            AggregationType::Var => "var",
            AggregationType::VarP => "varP",
        }
    }

    /// Applies the aggregation to a group's values.
    pub fn apply(&self, values: &[Value]) -> Value {
        let summary = || NumericSummary::of(values);
        let number = match self {
            AggregationType::Unique => return Value::List(unique_values(values)),
            AggregationType::MinMax => {
                let summary = summary();
                return format!(
                    "{}..{}",
                    Value::Number(summary.min()),
                    Value::Number(summary.max())
                )
                .into();
            }
            AggregationType::UniqueCount => unique_values(values).len() as f64,
            AggregationType::Median => median(values),
            AggregationType::Sum => summary().sum(),
            AggregationType::Min => summary().min(),
            AggregationType::Max => summary().max(),
            AggregationType::Average => summary().mean(),
            AggregationType::Count => summary().count() as f64,
            AggregationType::CountNumbers => summary().numbers() as f64,
            AggregationType::Product => summary().product(),
            AggregationType::Var => summary().variance(false),
            AggregationType::VarP => summary().variance(true),
            AggregationType::StdDev => summary().variance(false).sqrt(),
            AggregationType::StdDevP => summary().variance(true).sqrt(),
        };
        Value::Number(number)
    }
}

// ============================================================================
// NUMERIC SUMMARY
// ============================================================================

/// Single pass summary of a group's values. Every value counts; only numbers
/// feed the running statistics. Empty statistics read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericSummary {
    count: u64,
    numbers: u64,
    sum: f64,
    product: Option<f64>,
    range: Option<(f64, f64)>,
    mean: f64,
    // Welford running sum of squared deviations
    m2: f64,
}

impl NumericSummary {
    pub fn of(values: &[Value]) -> Self {
        let mut summary = NumericSummary::default();
        values.iter().for_each(|value| summary.push(value));
        summary
    }

    pub fn push(&mut self, value: &Value) {
        self.count += 1;
        let Some(n) = value.as_f64().filter(|n| !n.is_nan()) else {
            return;
        };
        self.numbers += 1;
        self.sum += n;
        self.product = Some(self.product.map_or(n, |p| p * n));
        self.range = Some(match self.range {
            Some((lo, hi)) => (lo.min(n), hi.max(n)),
            None => (n, n),
        });
        let delta = n - self.mean;
        self.mean += delta / self.numbers as f64;
        self.m2 += delta * (n - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn numbers(&self) -> u64 {
        self.numbers
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn product(&self) -> f64 {
        self.product.unwrap_or(0.0)
    }

    pub fn min(&self) -> f64 {
        self.range.map_or(0.0, |(lo, _)| lo)
    }

    pub fn max(&self) -> f64 {
        self.range.map_or(0.0, |(_, hi)| hi)
    }

    pub fn mean(&self) -> f64 {
        if self.numbers == 0 {
            0.0
        } else {
            self.sum / self.numbers as f64
        }
    }

    /// Population or sample variance.
    pub fn variance(&self, population: bool) -> f64 {
        let divisor = if population {
            self.numbers
        } else {
            self.numbers.saturating_sub(1)
        };
        if divisor == 0 {
            0.0
        } else {
            self.m2 / divisor as f64
        }
    }
}

fn unique_values(values: &[Value]) -> Vec<Value> {
    let mut seen: FxHashSet<GroupKey> = FxHashSet::default();
    values
        .iter()
        .filter(|v| seen.insert(v.group_key()))
        .cloned()
        .collect()
}

fn median(values: &[Value]) -> f64 {
    let mut numbers: Vec<Value> = values
        .iter()
        .filter(|v| v.as_f64().map_or(false, |n| !n.is_nan()))
        .cloned()
        .collect();
    if numbers.is_empty() {
        return 0.0;
    }
    numbers.sort_by(compare_values);
    let numbers: Vec<f64> = numbers.iter().filter_map(Value::as_f64).collect();
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    }
}

// ============================================================================
// COLUMN AGGREGATE CONFIGURATION
// ============================================================================

/// One aggregator: a registry/built-in name or a function.
#[derive(Clone)]
pub enum Aggregator {
    Named(String),
    Custom(AggregateFn),
}

impl Aggregator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Value], &[RowRef]) -> Result<Value, AggregateError> + Send + Sync + 'static,
    {
        Aggregator::Custom(Arc::new(f))
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregator::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Aggregator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&str> for Aggregator {
    fn from(name: &str) -> Self {
        Aggregator::Named(name.to_string())
    }
}

impl From<AggregationType> for Aggregator {
    fn from(kind: AggregationType) -> Self {
        Aggregator::Named(kind.name().to_string())
    }
}

/// A column's aggregate configuration.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// Receives every leaf value of the group's subtree.
    Single(Aggregator),
    /// `leaf` runs on the lowest grouping level; `parent` runs above it.
    TwoStage { leaf: Aggregator, parent: Aggregator },
}

impl Aggregate {
    pub fn two_stage(leaf: impl Into<Aggregator>, parent: impl Into<Aggregator>) -> Self {
        Aggregate::TwoStage {
            leaf: leaf.into(),
            parent: parent.into(),
        }
    }
}

impl From<&str> for Aggregate {
    fn from(name: &str) -> Self {
        Aggregate::Single(name.into())
    }
}

impl From<AggregationType> for Aggregate {
    fn from(kind: AggregationType) -> Self {
        Aggregate::Single(kind.into())
    }
}

impl From<Aggregator> for Aggregate {
    fn from(aggregator: Aggregator) -> Self {
        Aggregate::Single(aggregator)
    }
}

/// What the parent stage of a two-stage aggregate receives above the lowest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChainMode {
    /// The children's already-aggregated values.
    #[default]
    Cumulative,
    /// The raw leaf values of the whole subtree.
    LeafValues,
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// An aggregate with every name resolved to a function.
#[derive(Clone)]
pub(crate) enum ResolvedAggregate {
    Single(AggregateFn),
    TwoStage {
        leaf: AggregateFn,
        parent: AggregateFn,
    },
}

pub(crate) fn resolve_aggregate(
    column_id: &str,
    aggregate: &Aggregate,
    registries: &Registries,
) -> Result<ResolvedAggregate, ConfigurationError> {
    Ok(match aggregate {
        Aggregate::Single(a) => ResolvedAggregate::Single(resolve_aggregator(column_id, a, registries)?),
        Aggregate::TwoStage { leaf, parent } => ResolvedAggregate::TwoStage {
            leaf: resolve_aggregator(column_id, leaf, registries)?,
            parent: resolve_aggregator(column_id, parent, registries)?,
        },
    })
}

fn resolve_aggregator(
    column_id: &str,
    aggregator: &Aggregator,
    registries: &Registries,
) -> Result<AggregateFn, ConfigurationError> {
    match aggregator {
        Aggregator::Custom(f) => Ok(Arc::clone(f)),
        Aggregator::Named(name) => {
            if let Some(f) = registries.aggregations.get(name) {
                return Ok(Arc::clone(f));
            }
            let kind = AggregationType::from_name(name).ok_or_else(|| {
                ConfigurationError::UnknownAggregation {
                    column_id: column_id.to_string(),
                    name: name.clone(),
                }
            })?;
            Ok(Arc::new(move |values: &[Value], _rows: &[RowRef]| Ok(kind.apply(values))))
        }
    }
}
