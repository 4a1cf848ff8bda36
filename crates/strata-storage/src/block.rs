//! Block managers.
//!
//! A block manager owns the pool of fixed-size on-disk blocks that make up
//! a database image: it allocates fresh block ids, reads and writes whole
//! blocks, and owns the header that names the current checkpoint root.
//!
//! Allocation is append-only. Blocks written before a crash but never named
//! by a header are orphaned; the previous image stays intact because the
//! header write is the only commit point.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use strata_common::config::BlockConfig;
use strata_common::constants::FILE_HEADER_SIZE;
use strata_common::types::BlockId;

use crate::error::{StorageError, StorageResult};
use crate::file::BlockFile;
use crate::header::DatabaseHeader;

/// The block manager interface consumed by meta streams and the checkpoint.
pub trait BlockManager: Send + Sync {
    /// Size of each block in bytes.
    fn block_size(&self) -> usize;

    /// Opens a new allocation generation for a checkpoint.
    ///
    /// Every block allocated after this call is fresh: no block of the
    /// previous image is ever overwritten before the new header commits.
    fn start_checkpoint(&self);

    /// Allocates a fresh block id.
    fn allocate_block(&self) -> StorageResult<BlockId>;

    /// Writes one full block. `data` must be exactly `block_size` bytes.
    fn write_block(&self, block_id: BlockId, data: &[u8]) -> StorageResult<()>;

    /// Reads one full block into `buf` (exactly `block_size` bytes).
    fn read_block(&self, block_id: BlockId, buf: &mut [u8]) -> StorageResult<()>;

    /// Returns the root meta block of the current image, `INVALID` if none.
    fn meta_block(&self) -> BlockId;

    /// Atomically publishes a new header. This is the commit point.
    fn write_header(&self, header: &DatabaseHeader) -> StorageResult<()>;
}

// =============================================================================
// File-backed implementation
// =============================================================================

/// Block manager over a single database file.
///
/// Layout: a reserved header region at offset 0, then block `i` at
/// `FILE_HEADER_SIZE + i * block_size`.
pub struct FileBlockManager {
    file: BlockFile,
    block_size: usize,
    /// Next block id to hand out.
    next_block: AtomicI64,
    /// Monotonic checkpoint generation, for diagnostics.
    generation: AtomicU64,
    /// Cached copy of the on-disk header.
    header: Mutex<DatabaseHeader>,
}

impl FileBlockManager {
    /// Opens (or creates) a database file.
    ///
    /// A fresh file gets an empty header written immediately so that a
    /// crash before the first checkpoint leaves a well-formed file behind.
    pub fn open(path: impl AsRef<Path>, config: &BlockConfig) -> StorageResult<Self> {
        config.validate().map_err(StorageError::config)?;
        let file = BlockFile::open(path)?;
        let block_size = config.block_size;

        let header = if file.is_empty()? {
            let header = DatabaseHeader::empty();
            Self::write_header_to(&file, &header)?;
            header
        } else {
            let mut buf = vec![0u8; DatabaseHeader::SIZE];
            file.read_exact_at(&mut buf, 0)?;
            DatabaseHeader::deserialize(&buf[..])?
        };

        let data_len = file.len()?.saturating_sub(FILE_HEADER_SIZE as u64);
        let next_block = data_len.div_ceil(block_size as u64) as i64;

        Ok(Self {
            file,
            block_size,
            next_block: AtomicI64::new(next_block),
            generation: AtomicU64::new(0),
            header: Mutex::new(header),
        })
    }

    fn block_offset(&self, block_id: BlockId) -> u64 {
        FILE_HEADER_SIZE as u64 + block_id.as_i64() as u64 * self.block_size as u64
    }

    fn write_header_to(file: &BlockFile, header: &DatabaseHeader) -> StorageResult<()> {
        let mut buf = BytesMut::with_capacity(FILE_HEADER_SIZE);
        header.serialize(&mut buf);
        buf.resize(FILE_HEADER_SIZE, 0);
        file.write_all_at(&buf, 0)?;
        file.sync()
    }
}

impl BlockManager for FileBlockManager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn start_checkpoint(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "starting checkpoint allocation generation");
    }

    fn allocate_block(&self) -> StorageResult<BlockId> {
        Ok(BlockId::new(self.next_block.fetch_add(1, Ordering::AcqRel)))
    }

    fn write_block(&self, block_id: BlockId, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), self.block_size);
        if !block_id.is_valid() {
            return Err(StorageError::BlockNotFound { block_id });
        }
        self.file.write_all_at(data, self.block_offset(block_id))
    }

    fn read_block(&self, block_id: BlockId, buf: &mut [u8]) -> StorageResult<()> {
        debug_assert_eq!(buf.len(), self.block_size);
        if !block_id.is_valid() || block_id.as_i64() >= self.next_block.load(Ordering::Acquire) {
            return Err(StorageError::BlockNotFound { block_id });
        }
        self.file.read_exact_at(buf, self.block_offset(block_id))
    }

    fn meta_block(&self) -> BlockId {
        self.header.lock().meta_block
    }

    fn write_header(&self, header: &DatabaseHeader) -> StorageResult<()> {
        // All data blocks must be durable before the header can name them.
        self.file.sync()?;
        Self::write_header_to(&self.file, header)?;
        *self.header.lock() = *header;
        debug!(meta_block = %header.meta_block, "database header committed");
        Ok(())
    }
}

impl std::fmt::Debug for FileBlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBlockManager")
            .field("block_size", &self.block_size)
            .field("next_block", &self.next_block.load(Ordering::Relaxed))
            .field("meta_block", &self.meta_block())
            .finish()
    }
}

// =============================================================================
// In-memory implementation
// =============================================================================

/// Block manager backed by a heap map; used by unit tests and transient
/// databases.
pub struct InMemoryBlockManager {
    block_size: usize,
    blocks: RwLock<HashMap<i64, Vec<u8>>>,
    next_block: AtomicI64,
    generation: AtomicU64,
    header: Mutex<DatabaseHeader>,
}

impl InMemoryBlockManager {
    /// Creates an empty in-memory block pool.
    #[must_use]
    pub fn new(config: &BlockConfig) -> Self {
        Self {
            block_size: config.block_size,
            blocks: RwLock::new(HashMap::new()),
            next_block: AtomicI64::new(0),
            generation: AtomicU64::new(0),
            header: Mutex::new(DatabaseHeader::empty()),
        }
    }

    /// Number of blocks currently stored.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }
}

impl Default for InMemoryBlockManager {
    fn default() -> Self {
        Self::new(&BlockConfig::default())
    }
}

impl BlockManager for InMemoryBlockManager {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn start_checkpoint(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn allocate_block(&self) -> StorageResult<BlockId> {
        Ok(BlockId::new(self.next_block.fetch_add(1, Ordering::AcqRel)))
    }

    fn write_block(&self, block_id: BlockId, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), self.block_size);
        self.blocks
            .write()
            .insert(block_id.as_i64(), data.to_vec());
        Ok(())
    }

    fn read_block(&self, block_id: BlockId, buf: &mut [u8]) -> StorageResult<()> {
        let blocks = self.blocks.read();
        let data = blocks
            .get(&block_id.as_i64())
            .ok_or(StorageError::BlockNotFound { block_id })?;
        buf.copy_from_slice(data);
        Ok(())
    }

    fn meta_block(&self) -> BlockId {
        self.header.lock().meta_block
    }

    fn write_header(&self, header: &DatabaseHeader) -> StorageResult<()> {
        *self.header.lock() = *header;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBlockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockManager")
            .field("block_size", &self.block_size)
            .field("blocks", &self.block_count())
            .finish()
    }
}
