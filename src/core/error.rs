use thiserror::Error;

/// HTTP-equivalent status a store reports when `(partition key, row key)` is already taken.
pub const CONFLICT_STATUS: u16 = 409;

#[derive(Error, Debug)]
pub enum TableError {
    /// The store rejected a write because the key is already occupied.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other failure reported by the store collaborator.
    #[error("Storage error{}: {message}", status_suffix(.status))]
    Storage { status: Option<u16>, message: String },

    #[error("Retries exhausted in '{operation}' after {attempts} attempts: {entity}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        entity: String,
    },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, TableError>;

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl TableError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            status: None,
            message: message.into(),
        }
    }

    pub fn storage_with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Storage {
            status: Some(status),
            message: message.into(),
        }
    }

    /// HTTP-equivalent status code of the failure, when one is known.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Conflict(_) => Some(CONFLICT_STATUS),
            Self::Storage { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` when the failure carries one of `codes`.
    ///
    /// Callers use it to keep expected outcomes (e.g. a lost insert race) out of error logs.
    pub fn has_status(&self, codes: &[u16]) -> bool {
        self.status_code()
            .is_some_and(|status| codes.contains(&status))
    }
}

impl<T> From<std::sync::PoisonError<T>> for TableError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409() {
        let err = TableError::Conflict("orders/0001".to_string());
        assert_eq!(err.status_code(), Some(CONFLICT_STATUS));
        assert!(err.has_status(&[404, 409]));
        assert!(!err.has_status(&[404]));
    }

    #[test]
    fn storage_error_display_includes_status() {
        let err = TableError::storage_with_status(503, "server busy");
        assert_eq!(err.to_string(), "Storage error (503): server busy");
        assert_eq!(TableError::storage("boom").to_string(), "Storage error: boom");
    }

    #[test]
    fn cancelled_has_no_status() {
        assert_eq!(TableError::Cancelled.status_code(), None);
        assert!(!TableError::Cancelled.has_status(&[CONFLICT_STATUS]));
    }
}
