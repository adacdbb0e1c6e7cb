//! FILENAME: core/pipeline/src/stage.rs
//! PURPOSE: The stage abstraction and its memoizing wrapper.
//! CONTEXT: A stage declares a dependency key built from its input and the
//! state it reads. `Memoized` reruns the stage only when the key changes and
//! otherwise hands back the cached output, which shares its `Arc`s.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::columns::ColumnSet;
use crate::error::TableResult;
use crate::options::{Registries, TableOptions};
use crate::state::TableState;

/// Everything a stage may read besides its input rows.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub columns: &'a Arc<ColumnSet>,
    pub state: &'a TableState,
    pub options: &'a TableOptions,
    pub registries: &'a Arc<Registries>,
}

pub trait Stage {
    type Input;
    type Key: PartialEq;
    type Output: Clone;

    const NAME: &'static str;

    fn key(&self, input: &Self::Input, ctx: &StageContext<'_>) -> Self::Key;

    fn run(&self, input: &Self::Input, ctx: &StageContext<'_>) -> TableResult<Self::Output>;
}

/// Compares by pointer, not by content.
pub struct Identity<T: ?Sized>(Arc<T>);

impl<T: ?Sized> Identity<T> {
    pub fn of(value: &Arc<T>) -> Self {
        Identity(Arc::clone(value))
    }
}

impl<T: ?Sized> PartialEq for Identity<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:p})", Arc::as_ptr(&self.0))
    }
}

pub struct Memoized<S: Stage> {
    stage: S,
    cache: Option<(S::Key, S::Output)>,
    runs: u64,
}

impl<S: Stage> Memoized<S> {
    pub fn new(stage: S) -> Self {
        Memoized {
            stage,
            cache: None,
            runs: 0,
        }
    }

    pub fn evaluate(&mut self, input: &S::Input, ctx: &StageContext<'_>) -> TableResult<S::Output> {
        let key = self.stage.key(input, ctx);
        if let Some((cached_key, output)) = &self.cache {
            if *cached_key == key {
                debug!(target: "rowtree::pipeline", "{}: reused", S::NAME);
                return Ok(output.clone());
            }
        }

        debug!(target: "rowtree::pipeline", "{}: recomputing", S::NAME);
        let output = self.stage.run(input, ctx)?;
        self.runs += 1;
        self.cache = Some((key, output.clone()));
        Ok(output)
    }

    /// How many times the stage actually ran.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}
