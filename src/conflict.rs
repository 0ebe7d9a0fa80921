use crate::core::{CONFLICT_STATUS, TableError};
use std::fmt;

/// Classification of a failed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    /// `(partition key, row key)` is already taken. Retryable with a new key or a re-read.
    KeyOccupied,
    /// Transport, cancellation or any other store failure. Never retried here.
    Other,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::KeyOccupied => "key_occupied",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

/// Classifies a store failure.
///
/// Adapters that surface raw status codes instead of [`TableError::Conflict`]
/// are recognised by a 409 status.
pub fn classify_write_failure(err: &TableError) -> WriteFailure {
    match err {
        TableError::Conflict(_) => WriteFailure::KeyOccupied,
        TableError::Storage {
            status: Some(CONFLICT_STATUS),
            ..
        } => WriteFailure::KeyOccupied,
        _ => WriteFailure::Other,
    }
}

pub fn is_conflict(err: &TableError) -> bool {
    classify_write_failure(err) == WriteFailure::KeyOccupied
}
