//! Storage error types.

use std::io;
use thiserror::Error;

use strata_common::types::BlockId;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error from the underlying file system.
    #[error("storage I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// The database file header is not a StrataDB header.
    #[error("invalid database header magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// Expected magic number.
        expected: u32,
        /// Magic number found in the file.
        found: u32,
    },

    /// The database file was written by an unsupported format version.
    #[error("unsupported storage version: expected {expected}, found {found}")]
    UnsupportedVersion {
        /// Version this build supports.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// A block id did not resolve to a live block.
    #[error("block {block_id} not found")]
    BlockNotFound {
        /// The missing block id.
        block_id: BlockId,
    },

    /// The buffer manager refused an allocation.
    #[error("buffer memory limit exceeded: requested {requested} bytes, {used} of {limit} in use")]
    OutOfMemory {
        /// Bytes requested by the failed allocation.
        requested: usize,
        /// Bytes currently in use.
        used: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A meta-block stream ended in the middle of a typed read.
    #[error("unexpected end of meta-block stream reading {reading}")]
    UnexpectedEof {
        /// What was being read.
        reading: &'static str,
    },

    /// A length-prefixed string held invalid UTF-8.
    #[error("invalid UTF-8 in stored string: {source}")]
    InvalidString {
        /// The conversion error.
        #[from]
        source: std::string::FromUtf8Error,
    },

    /// Invalid configuration.
    #[error("storage configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl StorageError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
