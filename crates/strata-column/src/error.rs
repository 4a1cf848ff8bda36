//! Column and chunk error types.

use thiserror::Error;

use strata_common::types::LogicalType;
use strata_storage::StorageError;

/// Result type for column operations.
pub type ColumnResult<T> = Result<T, ColumnError>;

/// Errors that can occur while building or scanning columnar data.
#[derive(Debug, Error)]
pub enum ColumnError {
    /// A row or chunk had the wrong number of columns.
    #[error("column count mismatch: expected {expected}, got {actual}")]
    ColumnCountMismatch {
        /// Expected column count.
        expected: usize,
        /// Actual column count.
        actual: usize,
    },

    /// A value did not conform to its column type.
    #[error("type mismatch: value {value} is not of type {expected}")]
    TypeMismatch {
        /// The column type.
        expected: LogicalType,
        /// Rendering of the offending value.
        value: String,
    },

    /// A chunk schema did not match the collection schema.
    #[error("schema mismatch at column {column}: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// Index of the first differing column.
        column: usize,
        /// Expected column type.
        expected: LogicalType,
        /// Actual column type.
        actual: LogicalType,
    },

    /// A chunk would exceed the vector width.
    #[error("chunk capacity exceeded: {rows} rows > capacity {capacity}")]
    CapacityExceeded {
        /// Rows the operation would produce.
        rows: usize,
        /// Maximum rows per chunk.
        capacity: usize,
    },

    /// A single chunk's list column held more elements than chunk metadata
    /// can address.
    #[error("list column overflows chunk metadata: {elements} elements")]
    ListTooLarge {
        /// Total flattened element count.
        elements: usize,
    },

    /// Error from the storage layer (allocation, pinning).
    #[error(transparent)]
    Storage {
        /// The underlying storage error.
        #[from]
        source: StorageError,
    },

    /// Invariant violation; indicates a bug.
    #[error("internal column error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl ColumnError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ColumnError::SchemaMismatch {
            column: 1,
            expected: LogicalType::Int32,
            actual: LogicalType::Varchar,
        };
        assert_eq!(
            err.to_string(),
            "schema mismatch at column 1: expected INTEGER, got VARCHAR"
        );
    }
}
