//! FILENAME: core/pipeline/src/table.rs
//! PURPOSE: A state owner driving the pipeline.
//! CONTEXT: `Table` holds the data, columns, options, registries and the
//! current state. Dispatching an action reduces the state and recomputes the
//! row model. A failed generation leaves both the previous state and the
//! previous row model in place.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::{info, warn};
use rowtree_model::Record;

use crate::actions::{reduce, Action, ReducerContext};
use crate::columns::{resolve_columns, ColumnSet, ColumnSpec};
use crate::error::TableResult;
use crate::options::{Registries, TableOptions};
use crate::pipeline::{Dataset, RowModel, RowPipeline, StageRuns};
use crate::state::TableState;

// ============================================================================
// FETCH LISTENER
// ============================================================================

/// Snapshot sent after every dispatched action, e.g. to fetch server-side pages.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub action: &'static str,
    pub state: TableState,
    pub generation: u64,
}

/// Fire-and-forget receiver of state snapshots.
pub trait FetchListener: Send {
    fn on_fetch_data(&self, request: &FetchRequest);
}

impl FetchListener for Sender<FetchRequest> {
    fn on_fetch_data(&self, request: &FetchRequest) {
        if self.send(request.clone()).is_err() {
            warn!(target: "rowtree::actions", "Fetch listener channel is closed");
        }
    }
}

impl<F> FetchListener for F
where
    F: Fn(&FetchRequest) + Send,
{
    fn on_fetch_data(&self, request: &FetchRequest) {
        self(request)
    }
}

// ============================================================================
// TABLE
// ============================================================================

pub struct TableBuilder {
    columns: Vec<ColumnSpec>,
    data: Vec<Record>,
    options: TableOptions,
    registries: Registries,
    initial_state: TableState,
    fetch_listener: Option<Box<dyn FetchListener>>,
}

impl TableBuilder {
    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    pub fn initial_state(mut self, state: TableState) -> Self {
        self.initial_state = state;
        self
    }

    pub fn fetch_listener(mut self, listener: impl FetchListener + 'static) -> Self {
        self.fetch_listener = Some(Box::new(listener));
        self
    }

    /// Resolves the columns and computes the first generation.
    pub fn build(self) -> TableResult<Table> {
        let columns = Arc::new(resolve_columns(&self.columns)?);
        let mut table = Table {
            data: into_dataset(self.data),
            columns,
            options: self.options,
            registries: Arc::new(self.registries),
            state: self.initial_state.clone(),
            initial_state: self.initial_state,
            pipeline: RowPipeline::new(),
            model: None,
            fetch_listener: self.fetch_listener,
        };
        table.recompute()?;
        Ok(table)
    }
}

pub struct Table {
    data: Dataset,
    columns: Arc<ColumnSet>,
    options: TableOptions,
    registries: Arc<Registries>,
    initial_state: TableState,
    state: TableState,
    pipeline: RowPipeline,
    model: Option<RowModel>,
    fetch_listener: Option<Box<dyn FetchListener>>,
}

fn into_dataset(data: Vec<Record>) -> Dataset {
    Arc::new(data.into_iter().map(Arc::new).collect())
}

impl Table {
    pub fn builder(columns: Vec<ColumnSpec>, data: Vec<Record>) -> TableBuilder {
        TableBuilder {
            columns,
            data,
            options: TableOptions::default(),
            registries: Registries::default(),
            initial_state: TableState::default(),
            fetch_listener: None,
        }
    }

    pub fn new(columns: Vec<ColumnSpec>, data: Vec<Record>) -> TableResult<Table> {
        Table::builder(columns, data).build()
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// The last successfully computed row model.
    pub fn row_model(&self) -> Option<&RowModel> {
        self.model.as_ref()
    }

    pub fn stage_runs(&self) -> StageRuns {
        self.pipeline.stage_runs()
    }

    /// Reduces `action` into the state and recomputes.
    pub fn dispatch(&mut self, action: Action) -> TableResult<&RowModel> {
        info!(target: "rowtree::actions", "dispatch {}", action.name());
        let ctx = ReducerContext {
            columns: &self.columns,
            options: &self.options,
            registries: &self.registries,
            initial_state: &self.initial_state,
        };
        let next = reduce(&self.state, &action, &ctx)?;
        let model = self.pipeline.compute(
            &self.data,
            &self.columns,
            &next,
            &self.options,
            &self.registries,
        )?;
        self.state = next;

        if let Some(listener) = &self.fetch_listener {
            listener.on_fetch_data(&FetchRequest {
                action: action.name(),
                state: self.state.clone(),
                generation: model.generation,
            });
        }
        Ok(&*self.model.insert(model))
    }

    /// Replaces the state wholesale (for externally controlled state).
    pub fn set_state(&mut self, state: TableState) -> TableResult<&RowModel> {
        let model = self.pipeline.compute(
            &self.data,
            &self.columns,
            &state,
            &self.options,
            &self.registries,
        )?;
        self.state = state;
        Ok(&*self.model.insert(model))
    }

    /// Replaces the data and applies the enabled auto-resets.
    pub fn set_data(&mut self, data: Vec<Record>) -> TableResult<&RowModel> {
        let mut next = self.state.clone();
        let initial = &self.initial_state;
        if self.options.auto_reset_expanded {
            next.expanded = initial.expanded.clone();
        }
        if self.options.auto_reset_filters {
            next.filters = initial.filters.clone();
        }
        if self.options.auto_reset_global_filter {
            next.global_filter = initial.global_filter.clone();
        }
        if self.options.auto_reset_sort_by {
            next.sort_by = initial.sort_by.clone();
        }
        if self.options.auto_reset_group_by {
            next.group_by = initial.group_by.clone();
        }

        let data = into_dataset(data);
        let model = self.pipeline.compute(
            &data,
            &self.columns,
            &next,
            &self.options,
            &self.registries,
        )?;
        self.data = data;
        self.state = next;
        Ok(&*self.model.insert(model))
    }

    /// Replaces the column schema.
    pub fn set_columns(&mut self, columns: Vec<ColumnSpec>) -> TableResult<&RowModel> {
        let columns = Arc::new(resolve_columns(&columns)?);
        let model = self.pipeline.compute(
            &self.data,
            &columns,
            &self.state,
            &self.options,
            &self.registries,
        )?;
        self.columns = columns;
        Ok(&*self.model.insert(model))
    }

    /// Replaces the user registries; every stage reading them recomputes.
    pub fn set_registries(&mut self, registries: Registries) -> TableResult<&RowModel> {
        let registries = Arc::new(registries);
        let model = self.pipeline.compute(
            &self.data,
            &self.columns,
            &self.state,
            &self.options,
            &registries,
        )?;
        self.registries = registries;
        Ok(&*self.model.insert(model))
    }

    /// Recomputes the current state. Unchanged stages are reused.
    pub fn recompute(&mut self) -> TableResult<&RowModel> {
        let model = self.pipeline.compute(
            &self.data,
            &self.columns,
            &self.state,
            &self.options,
            &self.registries,
        )?;
        Ok(&*self.model.insert(model))
    }
}
