//! FILENAME: core/pipeline/src/pipeline.rs
//! PURPOSE: Sequences the stages and assembles the row model.
//! CONTEXT: Order is fixed: materialize -> group -> column filters -> global
//! filter -> sort -> expand. Each stage is memoized on a key of its upstream
//! rows (by identity), the state slice it reads, and the column set and
//! registries (by identity). A disabled or manual stage passes its input through.

use std::sync::Arc;

use rowtree_model::{flatten_rows, Record, RowRef, Rows};

use crate::aggregation::ChainMode;
use crate::columns::ColumnSet;
use crate::error::TableResult;
use crate::expanded::{expand_rows, ExpandOutput, ExpandedRow};
use crate::filter_types::FilterValue;
use crate::filters::{filter_rows, FilterOutput};
use crate::global_filter::global_filter_rows;
use crate::grouping::group_rows;
use crate::materialize::materialize_rows;
use crate::options::{Registries, TableOptions};
use crate::sorting::sort_rows;
use crate::stage::{Identity, Memoized, Stage, StageContext};
use crate::state::{ExpandedState, Filters, SortingRule, TableState};

/// Source records shared with the pipeline.
pub type Dataset = Arc<Vec<Arc<Record>>>;

// ============================================================================
// STAGES
// ============================================================================

pub struct MaterializeStage;

impl Stage for MaterializeStage {
    type Input = Dataset;
    type Key = (Identity<Vec<Arc<Record>>>, Identity<ColumnSet>, String);
    type Output = Rows;

    const NAME: &'static str = "materialize";

    fn key(&self, input: &Dataset, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            Identity::of(ctx.columns),
            ctx.options.sub_rows_key.clone(),
        )
    }

    fn run(&self, input: &Dataset, ctx: &StageContext<'_>) -> TableResult<Rows> {
        Ok(Arc::new(materialize_rows(
            input,
            ctx.columns,
            &ctx.options.sub_rows_key,
        )))
    }
}

pub struct GroupStage;

impl Stage for GroupStage {
    type Input = Rows;
    type Key = (
        Identity<Vec<RowRef>>,
        Identity<ColumnSet>,
        Identity<Registries>,
        Vec<String>,
        bool,
        ChainMode,
    );
    type Output = Rows;

    const NAME: &'static str = "groupBy";

    fn key(&self, input: &Rows, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            Identity::of(ctx.columns),
            Identity::of(ctx.registries),
            ctx.state.group_by.clone(),
            ctx.options.grouping_active(),
            ctx.options.chain_mode,
        )
    }

    fn run(&self, input: &Rows, ctx: &StageContext<'_>) -> TableResult<Rows> {
        if !ctx.options.grouping_active() || ctx.state.group_by.is_empty() {
            return Ok(Arc::clone(input));
        }
        Ok(Arc::new(group_rows(
            input,
            &ctx.state.group_by,
            ctx.columns,
            ctx.registries,
            ctx.options.chain_mode,
        )?))
    }
}

pub struct ColumnFilterStage;

impl Stage for ColumnFilterStage {
    type Input = Rows;
    type Key = (
        Identity<Vec<RowRef>>,
        Identity<ColumnSet>,
        Identity<Registries>,
        Filters,
        bool,
        String,
    );
    type Output = FilterOutput;

    const NAME: &'static str = "filters";

    fn key(&self, input: &Rows, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            Identity::of(ctx.columns),
            Identity::of(ctx.registries),
            ctx.state.filters.clone(),
            ctx.options.filtering_active(),
            ctx.options.default_filter.clone(),
        )
    }

    fn run(&self, input: &Rows, ctx: &StageContext<'_>) -> TableResult<FilterOutput> {
        if !ctx.options.filtering_active() {
            return Ok(FilterOutput::passthrough(input));
        }
        Ok(filter_rows(
            input,
            &ctx.state.filters,
            ctx.columns,
            ctx.options,
            ctx.registries,
        ))
    }
}

pub struct GlobalFilterStage;

impl Stage for GlobalFilterStage {
    type Input = Rows;
    type Key = (
        Identity<Vec<RowRef>>,
        Identity<ColumnSet>,
        Identity<Registries>,
        Option<FilterValue>,
        bool,
        String,
        Option<Vec<String>>,
    );
    type Output = Rows;

    const NAME: &'static str = "globalFilter";

    fn key(&self, input: &Rows, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            Identity::of(ctx.columns),
            Identity::of(ctx.registries),
            ctx.state.global_filter.clone(),
            ctx.options.global_filtering_active(),
            ctx.options.global_filter.clone(),
            ctx.options.global_filter_columns.clone(),
        )
    }

    fn run(&self, input: &Rows, ctx: &StageContext<'_>) -> TableResult<Rows> {
        match &ctx.state.global_filter {
            Some(value) if ctx.options.global_filtering_active() => Ok(global_filter_rows(
                input,
                value,
                ctx.columns,
                ctx.options,
                ctx.registries,
            )),
            _ => Ok(Arc::clone(input)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortOutput {
    pub rows: Rows,
    /// Every row of the sorted tree, depth-first.
    pub flat_rows: Rows,
}

pub struct SortStage;

impl Stage for SortStage {
    type Input = Rows;
    type Key = (
        Identity<Vec<RowRef>>,
        Identity<ColumnSet>,
        Identity<Registries>,
        Vec<SortingRule>,
        bool,
    );
    type Output = SortOutput;

    const NAME: &'static str = "sortBy";

    fn key(&self, input: &Rows, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            Identity::of(ctx.columns),
            Identity::of(ctx.registries),
            ctx.state.sort_by.clone(),
            ctx.options.sorting_active(),
        )
    }

    fn run(&self, input: &Rows, ctx: &StageContext<'_>) -> TableResult<SortOutput> {
        let rows = if ctx.options.sorting_active() && !ctx.state.sort_by.is_empty() {
            Arc::new(sort_rows(
                input,
                &ctx.state.sort_by,
                ctx.columns,
                ctx.registries,
            )?)
        } else {
            Arc::clone(input)
        };
        let flat_rows = Arc::new(flatten_rows(&rows));
        Ok(SortOutput { rows, flat_rows })
    }
}

pub struct ExpandStage;

impl Stage for ExpandStage {
    type Input = Rows;
    type Key = (Identity<Vec<RowRef>>, ExpandedState, bool, bool);
    type Output = ExpandOutput;

    const NAME: &'static str = "expanded";

    fn key(&self, input: &Rows, ctx: &StageContext<'_>) -> Self::Key {
        (
            Identity::of(input),
            ctx.state.expanded.clone(),
            ctx.options.paginate_expanded_rows,
            ctx.options.expand_sub_rows,
        )
    }

    fn run(&self, input: &Rows, ctx: &StageContext<'_>) -> TableResult<ExpandOutput> {
        Ok(expand_rows(
            input,
            &ctx.state.expanded,
            &ctx.options.expand_options(),
        ))
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Per-column view of the current generation.
#[derive(Debug, Clone)]
pub struct ColumnState {
    pub id: String,
    pub can_filter: bool,
    pub can_sort: bool,
    pub can_group_by: bool,
    pub is_grouped: bool,
    pub grouped_index: Option<usize>,
    pub is_sorted: bool,
    pub sorted_index: Option<usize>,
    pub is_sorted_desc: Option<bool>,
    pub filter_value: Option<FilterValue>,
    /// Root rows before this column's filter (facet input).
    pub pre_filtered_rows: Rows,
    pub filtered_rows: Rows,
    pub is_visible: bool,
}

/// The output of one pipeline generation.
#[derive(Debug, Clone)]
pub struct RowModel {
    /// The flattened rows after expansion.
    pub rows: Arc<Vec<ExpandedRow>>,
    pub pre_grouped_rows: Rows,
    pub pre_filtered_rows: Rows,
    pub pre_global_filtered_rows: Rows,
    pub pre_sorted_rows: Rows,
    pub pre_expanded_rows: Rows,
    pub flat_rows: Rows,
    pub column_state: Vec<ColumnState>,
    pub visible_column_ids: Vec<String>,
    pub expanded_depth: usize,
    pub generation: u64,
}

impl RowModel {
    pub fn column(&self, id: &str) -> Option<&ColumnState> {
        self.column_state.iter().find(|c| c.id == id)
    }

    /// Entries with `is_visible` set.
    pub fn visible_rows(&self) -> impl Iterator<Item = &ExpandedRow> {
        self.rows.iter().filter(|e| e.is_visible)
    }
}

/// Runs per stage, for observing memoization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageRuns {
    pub materialize: u64,
    pub group_by: u64,
    pub filters: u64,
    pub global_filter: u64,
    pub sort_by: u64,
    pub expanded: u64,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct RowPipeline {
    materialize: Memoized<MaterializeStage>,
    group: Memoized<GroupStage>,
    filter: Memoized<ColumnFilterStage>,
    global_filter: Memoized<GlobalFilterStage>,
    sort: Memoized<SortStage>,
    expand: Memoized<ExpandStage>,
    generation: u64,
}

impl Default for RowPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RowPipeline {
    pub fn new() -> Self {
        RowPipeline {
            materialize: Memoized::new(MaterializeStage),
            group: Memoized::new(GroupStage),
            filter: Memoized::new(ColumnFilterStage),
            global_filter: Memoized::new(GlobalFilterStage),
            sort: Memoized::new(SortStage),
            expand: Memoized::new(ExpandStage),
            generation: 0,
        }
    }

    /// Produces the row model for one generation.
    /// On error nothing is returned and the generation counter does not advance.
    pub fn compute(
        &mut self,
        data: &Dataset,
        columns: &Arc<ColumnSet>,
        state: &TableState,
        options: &TableOptions,
        registries: &Arc<Registries>,
    ) -> TableResult<RowModel> {
        let ctx = StageContext {
            columns,
            state,
            options,
            registries,
        };

        let materialized = self.materialize.evaluate(data, &ctx)?;
        let grouped = self.group.evaluate(&materialized, &ctx)?;
        let filtered = self.filter.evaluate(&grouped, &ctx)?;
        let global_filtered = self.global_filter.evaluate(&filtered.rows, &ctx)?;
        let sorted = self.sort.evaluate(&global_filtered, &ctx)?;
        let expanded = self.expand.evaluate(&sorted.rows, &ctx)?;

        self.generation += 1;

        Ok(RowModel {
            rows: expanded.rows,
            pre_grouped_rows: materialized,
            pre_filtered_rows: grouped,
            pre_global_filtered_rows: Arc::clone(&filtered.rows),
            pre_sorted_rows: global_filtered,
            pre_expanded_rows: sorted.rows,
            flat_rows: sorted.flat_rows,
            column_state: column_states(&ctx, &filtered),
            visible_column_ids: columns.visible_ids(&state.group_by),
            expanded_depth: expanded.expanded_depth,
            generation: self.generation,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage_runs(&self) -> StageRuns {
        StageRuns {
            materialize: self.materialize.runs(),
            group_by: self.group.runs(),
            filters: self.filter.runs(),
            global_filter: self.global_filter.runs(),
            sort_by: self.sort.runs(),
            expanded: self.expand.runs(),
        }
    }
}

fn column_states(ctx: &StageContext<'_>, filtered: &FilterOutput) -> Vec<ColumnState> {
    let state = ctx.state;
    ctx.columns
        .iter()
        .map(|column| {
            let grouped_index = state.group_by.iter().position(|id| id == &column.id);
            let sorted_index = state.sort_by.iter().position(|r| r.id == column.id);
            let (pre_filtered_rows, filtered_rows) = match filtered.column_rows.get(&column.id) {
                Some(rows) => (
                    Arc::clone(&rows.pre_filtered_rows),
                    Arc::clone(&rows.filtered_rows),
                ),
                None => (Arc::clone(&filtered.rows), Arc::clone(&filtered.rows)),
            };
            ColumnState {
                id: column.id.clone(),
                can_filter: column.can_filter(ctx.options),
                can_sort: column.can_sort(ctx.options),
                can_group_by: column.can_group_by(ctx.options),
                is_grouped: grouped_index.is_some(),
                grouped_index,
                is_sorted: sorted_index.is_some(),
                sorted_index,
                is_sorted_desc: sorted_index.map(|i| state.sort_by[i].desc),
                filter_value: state.filters.get(&column.id).cloned(),
                pre_filtered_rows,
                filtered_rows,
                is_visible: column.visible && grouped_index.is_none(),
            }
        })
        .collect()
}
