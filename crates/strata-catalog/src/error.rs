//! Catalog error types.

use thiserror::Error;

use strata_column::ColumnError;
use strata_storage::StorageError;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// An entry with the same name already exists in the target scope.
    #[error("{kind} \"{name}\" already exists")]
    AlreadyExists {
        /// Entry kind ("schema", "table", ...).
        kind: &'static str,
        /// Entry name.
        name: String,
    },

    /// The named entry does not exist.
    #[error("{kind} \"{name}\" does not exist")]
    NotFound {
        /// Entry kind.
        kind: &'static str,
        /// Entry name.
        name: String,
    },

    /// A create info failed validation.
    #[error("invalid {kind} definition: {message}")]
    InvalidInfo {
        /// Entry kind.
        kind: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A serialized logical type carried an unknown tag.
    #[error("unknown logical type tag {tag}")]
    UnknownTypeTag {
        /// The offending tag byte.
        tag: u8,
    },

    /// A sequence ran past its bounds without cycling.
    #[error("sequence \"{name}\" is exhausted")]
    SequenceExhausted {
        /// Sequence name.
        name: String,
    },

    /// Error from the storage layer.
    #[error(transparent)]
    Storage {
        /// The underlying storage error.
        #[from]
        source: StorageError,
    },

    /// Error from the columnar layer.
    #[error(transparent)]
    Column {
        /// The underlying column error.
        #[from]
        source: ColumnError,
    },
}
