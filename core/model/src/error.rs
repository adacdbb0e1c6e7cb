//! FILENAME: core/model/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid row path segment: '{0}'")]
    InvalidPathSegment(String),
}
