//! Checkpoint error types.

use thiserror::Error;

use strata_catalog::CatalogError;
use strata_column::ColumnError;
use strata_storage::StorageError;

/// Result type for checkpoint operations.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors raised while writing or loading a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A catalog scope held an entry kind the checkpoint cannot persist.
    #[error("checkpointing {entity} entries is not implemented")]
    NotImplemented {
        /// The unsupported entry kind.
        entity: String,
    },

    /// The persisted image is inconsistent with its declared layout.
    #[error("corrupt checkpoint image: {message}")]
    Corrupt {
        /// What was inconsistent.
        message: String,
    },

    /// Error from the storage layer.
    #[error(transparent)]
    Storage {
        /// The underlying storage error.
        #[from]
        source: StorageError,
    },

    /// Error from the catalog.
    #[error(transparent)]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: CatalogError,
    },

    /// Error from the columnar layer.
    #[error(transparent)]
    Column {
        /// The underlying column error.
        #[from]
        source: ColumnError,
    },
}

impl CheckpointError {
    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CheckpointError::NotImplemented {
            entity: "index".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "checkpointing index entries is not implemented"
        );
    }
}
