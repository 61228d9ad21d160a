//! Store error taxonomy.

use manifest_core::{ValidationError, YearKeyError};
use thiserror::Error;

use crate::store::YearState;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidYearKey(#[from] YearKeyError),

    #[error("unknown dimension: {id}")]
    UnknownDimension { id: String },

    #[error("task {task_id} not found in month {month}")]
    TaskNotFound { task_id: String, month: usize },

    #[error("{what} index {index} out of range (expected 0..{len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("a dimension titled '{title}' already exists")]
    DuplicateTitle { title: String },

    #[error("year {year} is {state}; load it before mutating")]
    InvalidState { year: String, state: YearState },

    #[error("persistence failure during {op}: {reason}")]
    PersistenceFailure { op: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn persistence(op: &'static str, err: anyhow::Error) -> Self {
        StoreError::PersistenceFailure {
            op,
            reason: format!("{err:#}"),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
