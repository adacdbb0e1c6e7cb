//! FILENAME: core/model/src/lib.rs
//! PURPOSE: Shared data types for the rowtree pipeline.
//! CONTEXT: Re-exports the value, record, path and row types used by every
//! pipeline stage and by consumers reading the produced row tree.

pub mod error;
pub mod path;
pub mod record;
pub mod row;
pub mod value;

// Re-export commonly used types at the crate root
pub use error::ModelError;
pub use path::{PathSegment, RowPath};
pub use record::{lookup_path, resolve_path, sub_records, Record};
pub use row::{flatten_rows, leaf_rows, Row, RowRef, RowValues, Rows};
pub use value::{compare_values, GroupKey, OrderedFloat, Value};
