//! Executor error types.

use thiserror::Error;

use strata_column::ColumnError;

/// Result type for executor operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised while executing a pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Cooperative cancellation, observed at operator-span entry.
    #[error("query interrupted")]
    Interrupted,

    /// Invariant violation; indicates a bug in the executor or an operator.
    #[error("internal executor error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Failure reported by an operator implementation.
    #[error("operator {operator} failed: {message}")]
    Operator {
        /// Name of the failing operator.
        operator: &'static str,
        /// Error message.
        message: String,
    },

    /// Error from the columnar layer (chunk or collection operations).
    #[error(transparent)]
    Column {
        /// The underlying column error.
        #[from]
        source: ColumnError,
    },
}

impl ExecError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an operator failure.
    pub fn operator(operator: &'static str, message: impl Into<String>) -> Self {
        Self::Operator {
            operator,
            message: message.into(),
        }
    }
}
