//! System-wide constants for StrataDB.
//!
//! This module defines constants used across the engine crates.

// =============================================================================
// Vectorized Execution Constants
// =============================================================================

/// Number of rows processed per vector.
///
/// Every row batch flowing through the engine holds at most this many rows.
/// Operators and copy kernels are written against this width.
pub const VECTOR_SIZE: usize = 2048;

/// Output width below which a filtered batch is considered "too narrow".
///
/// When an operator consumes a wide batch and produces fewer than this many
/// rows, the executor buffers the output and compacts it back toward full
/// vector width before forwarding it downstream.
pub const CACHE_THRESHOLD: usize = VECTOR_SIZE / 8;

// =============================================================================
// Block and Storage Constants
// =============================================================================

/// Default size of a storage block in bytes (256 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Minimum configurable block size in bytes (4 KiB).
pub const MIN_BLOCK_SIZE: usize = 4 * 1024;

/// Bytes reserved at the start of every meta block for the next-block pointer.
pub const BLOCK_HEADER_SIZE: usize = 8;

/// Bytes reserved at the start of the database file for the header.
pub const FILE_HEADER_SIZE: usize = 4096;

/// Magic number identifying a StrataDB database file.
pub const STRATA_MAGIC: u32 = 0x5354_5241; // "STRA" in ASCII

/// Version number of the on-disk storage format.
pub const STORAGE_VERSION: u32 = 1;

// =============================================================================
// Collection Constants
// =============================================================================

/// Maximum number of chunks stored in a single collection segment.
///
/// A new segment is started once the current one holds this many chunks.
pub const SEGMENT_CHUNK_CAPACITY: usize = 64;

/// Sentinel for "no entry" in per-segment metadata tables.
pub const INVALID_INDEX: usize = usize::MAX;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_constants() {
        assert!(VECTOR_SIZE.is_power_of_two());
        assert!(CACHE_THRESHOLD < VECTOR_SIZE);
        // Compaction targets full batches; the threshold must leave room.
        assert!(VECTOR_SIZE - CACHE_THRESHOLD > CACHE_THRESHOLD);
    }

    #[test]
    fn test_block_constants() {
        assert!(DEFAULT_BLOCK_SIZE.is_power_of_two());
        assert!(MIN_BLOCK_SIZE.is_power_of_two());
        assert!(BLOCK_HEADER_SIZE < MIN_BLOCK_SIZE);
        assert!(FILE_HEADER_SIZE >= 16);
    }
}
