//! Core identifier types for StrataDB.
//!
//! Type-safe wrappers around numeric identifiers, preventing accidental
//! misuse of different ID kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block identifier - uniquely identifies a storage block.
///
/// Blocks are the fixed-size unit of storage. A negative value is never a
/// valid block; `BlockId::INVALID` (-1) doubles as the on-disk sentinel for
/// "no block" in the database header and in meta-block chains.
///
/// # Example
///
/// ```rust
/// use strata_common::types::BlockId;
///
/// let block = BlockId::new(42);
/// assert_eq!(block.as_i64(), 42);
/// assert!(!BlockId::INVALID.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(i64);

impl BlockId {
    /// Invalid block ID, used as a sentinel value (on disk and in memory).
    pub const INVALID: Self = Self(-1);

    /// First valid block ID.
    pub const FIRST: Self = Self(0);

    /// Creates a new `BlockId` from a raw i64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw i64 value.
    #[inline]
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns the next block ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid block ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }

    /// Creates a BlockId from bytes (little-endian).
    #[inline]
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_le_bytes(bytes))
    }

    /// Converts to bytes (little-endian).
    #[inline]
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "BlockId(INVALID)")
        } else {
            write!(f, "BlockId({})", self.0)
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BlockId {
    #[inline]
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

impl From<BlockId> for i64 {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0
    }
}
