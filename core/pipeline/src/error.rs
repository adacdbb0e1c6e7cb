//! FILENAME: core/pipeline/src/error.rs

use rowtree_model::ModelError;
use thiserror::Error;

/// The column schema is invalid or an operation names a column that does not exist.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("A column id is required when using a non-string accessor (column #{position})")]
    MissingColumnId { position: usize },

    #[error("Column id must not be empty (column #{position})")]
    EmptyColumnId { position: usize },

    #[error("Duplicate column id: '{0}'")]
    DuplicateColumnId(String),

    #[error("Could not find a column with id '{column_id}' while {operation}")]
    UnknownColumn {
        column_id: String,
        operation: &'static str,
    },
}

impl SchemaError {
    pub fn unknown_column(column_id: &str, operation: &'static str) -> Self {
        SchemaError::UnknownColumn {
            column_id: column_id.to_string(),
            operation,
        }
    }
}

/// A named sort type or aggregation could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Could not find a valid sort type '{sort_type}' for column '{column_id}'")]
    UnknownSortType {
        column_id: String,
        sort_type: String,
    },

    #[error("Could not find an aggregation '{name}' for column '{column_id}'")]
    UnknownAggregation { column_id: String, name: String },
}

/// Error returned by a user aggregate function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AggregateError(pub String);

impl AggregateError {
    pub fn new(message: impl Into<String>) -> Self {
        AggregateError(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Aggregation failed for column '{column_id}': {source}")]
    Aggregate {
        column_id: String,
        #[source]
        source: AggregateError,
    },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type TableResult<T> = Result<T, TableError>;
