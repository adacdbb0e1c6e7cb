//! FILENAME: core/pipeline/src/state.rs
//! PURPOSE: The configuration state that drives each pipeline generation.
//! CONTEXT: Plain data, owned by the caller (or by `Table`) and changed only
//! through the reducers in `actions`. Serializable so it can be snapshotted
//! for the fetch listener or a host application.

use rowtree_model::RowPath;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::filter_types::FilterValue;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableState {
    pub group_by: Vec<String>,
    pub filters: Filters,
    pub global_filter: Option<FilterValue>,
    pub sort_by: Vec<SortingRule>,
    pub expanded: ExpandedState,
}

// ============================================================================
// FILTERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub id: String,
    pub value: FilterValue,
}

/// Column filters in insertion order. Setting an existing column keeps its position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filters(Vec<FilterEntry>);

impl Filters {
    pub fn new() -> Self {
        Filters(Vec::new())
    }

    pub fn get(&self, id: &str) -> Option<&FilterValue> {
        self.0.iter().find(|e| e.id == id).map(|e| &e.value)
    }

    pub fn set(&mut self, id: impl Into<String>, value: FilterValue) {
        let id = id.into();
        match self.0.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.value = value,
            None => self.0.push(FilterEntry { id, value }),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<FilterValue> {
        let pos = self.0.iter().position(|e| e.id == id)?;
        Some(self.0.remove(pos).value)
    }

    pub fn retain(&mut self, f: impl FnMut(&FilterEntry) -> bool) {
        self.0.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterEntry> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FilterValue)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, FilterValue)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (id, value) in iter {
            filters.set(id, value);
        }
        filters
    }
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingRule {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

impl SortingRule {
    pub fn asc(id: impl Into<String>) -> Self {
        SortingRule { id: id.into(), desc: false }
    }

    pub fn desc(id: impl Into<String>) -> Self {
        SortingRule { id: id.into(), desc: true }
    }
}

// ============================================================================
// EXPANSION
// ============================================================================

/// Which rows are expanded.
///
/// In "all" mode `paths` lists the collapsed exceptions instead of the expanded rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandedState {
    all: bool,
    paths: FxHashSet<RowPath>,
}

impl ExpandedState {
    /// Every row expanded.
    pub fn all() -> Self {
        ExpandedState {
            all: true,
            paths: FxHashSet::default(),
        }
    }

    pub fn from_paths(paths: impl IntoIterator<Item = RowPath>) -> Self {
        ExpandedState {
            all: false,
            paths: paths.into_iter().collect(),
        }
    }

    pub fn is_expanded(&self, path: &RowPath) -> bool {
        self.all != self.paths.contains(path)
    }

    pub fn set_expanded(&mut self, path: &RowPath, expanded: bool) {
        // in "all" mode the set holds collapsed rows
        let record = expanded != self.all;
        if record {
            self.paths.insert(path.clone());
        } else {
            self.paths.remove(path);
        }
    }

    /// Flips a row, or forces it to `expanded` when given.
    pub fn toggle(&mut self, path: &RowPath, expanded: Option<bool>) {
        let target = expanded.unwrap_or_else(|| !self.is_expanded(path));
        self.set_expanded(path, target);
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    /// True in "all" mode with no collapsed exceptions.
    pub fn is_all_rows_expanded(&self) -> bool {
        self.all && self.paths.is_empty()
    }

    /// The explicitly expanded paths (collapsed exceptions in "all" mode).
    pub fn paths(&self) -> impl Iterator<Item = &RowPath> {
        self.paths.iter()
    }

    pub fn is_empty(&self) -> bool {
        !self.all && self.paths.is_empty()
    }
}
