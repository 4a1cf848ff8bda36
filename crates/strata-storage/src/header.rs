//! Database header codec.
//!
//! The header occupies the reserved region at the start of the database
//! file and is the single commit point of a checkpoint: an image becomes
//! visible exactly when the header naming its root meta block is written.

use bytes::{Buf, BufMut, BytesMut};

use strata_common::constants::{STORAGE_VERSION, STRATA_MAGIC};
use strata_common::types::BlockId;

use crate::error::{StorageError, StorageResult};

/// The database file header.
///
/// Serialized layout (little-endian): `magic: u32 | version: u32 |
/// meta_block: i64`. A `meta_block` of -1 means the file holds no
/// checkpoint image yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHeader {
    /// Magic number identifying a StrataDB file.
    pub magic: u32,
    /// Storage format version.
    pub version: u32,
    /// Root meta block of the current checkpoint image.
    pub meta_block: BlockId,
}

impl DatabaseHeader {
    /// Serialized size in bytes.
    pub const SIZE: usize = 16;

    /// Creates a header pointing at the given meta block.
    #[must_use]
    pub fn new(meta_block: BlockId) -> Self {
        Self {
            magic: STRATA_MAGIC,
            version: STORAGE_VERSION,
            meta_block,
        }
    }

    /// Creates the header of an empty database (no image).
    #[must_use]
    pub fn empty() -> Self {
        Self::new(BlockId::INVALID)
    }

    /// Serializes the header into the buffer.
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.magic);
        buf.put_u32_le(self.version);
        buf.put_i64_le(self.meta_block.as_i64());
    }

    /// Deserializes and validates a header.
    pub fn deserialize(mut buf: impl Buf) -> StorageResult<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(StorageError::UnexpectedEof {
                reading: "database header",
            });
        }
        let magic = buf.get_u32_le();
        if magic != STRATA_MAGIC {
            return Err(StorageError::InvalidMagic {
                expected: STRATA_MAGIC,
                found: magic,
            });
        }
        let version = buf.get_u32_le();
        if version != STORAGE_VERSION {
            return Err(StorageError::UnsupportedVersion {
                expected: STORAGE_VERSION,
                found: version,
            });
        }
        let meta_block = BlockId::new(buf.get_i64_le());
        Ok(Self {
            magic,
            version,
            meta_block,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = DatabaseHeader::new(BlockId::new(12));
        let mut buf = BytesMut::new();
        header.serialize(&mut buf);
        assert_eq!(buf.len(), DatabaseHeader::SIZE);

        let decoded = DatabaseHeader::deserialize(buf.freeze()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_empty_header() {
        let header = DatabaseHeader::empty();
        assert!(!header.meta_block.is_valid());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(0xDEAD_BEEF);
        buf.put_u32_le(STORAGE_VERSION);
        buf.put_i64_le(-1);
        let err = DatabaseHeader::deserialize(buf.freeze()).unwrap_err();
        assert!(matches!(err, StorageError::InvalidMagic { .. }));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(STRATA_MAGIC);
        buf.put_u32_le(99);
        buf.put_i64_le(-1);
        let err = DatabaseHeader::deserialize(buf.freeze()).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion { .. }));
    }
}
