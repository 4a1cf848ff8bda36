//! Buffer manager.
//!
//! The buffer manager hands out in-memory blocks to the columnar runtime.
//! A block stays alive for as long as an owning [`BlockHandle`] exists;
//! pins ([`BufferHandle`]) are short-lived references that track which
//! blocks are actively being read or written and unpin themselves on drop.
//!
//! Memory is accounted against an optional limit; an allocation that would
//! exceed the limit fails with [`StorageError::OutOfMemory`], which callers
//! use to roll back partial work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use strata_common::config::BufferConfig;
use strata_common::types::BlockId;

use crate::error::{StorageError, StorageResult};

/// How many allocations between sweeps of dead map entries.
const PRUNE_INTERVAL: u64 = 256;

/// Shared memory accounting state.
#[derive(Debug, Default)]
struct MemoryState {
    used: AtomicUsize,
}

/// A buffer-managed in-memory block.
pub struct BufferedBlock {
    id: BlockId,
    capacity: usize,
    data: RwLock<Vec<u8>>,
    pin_count: AtomicU32,
    memory: Arc<MemoryState>,
}

impl BufferedBlock {
    /// Returns the block id.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the block capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "unpinned block with pin_count = 0");
        old - 1
    }
}

impl Drop for BufferedBlock {
    fn drop(&mut self) {
        self.memory.used.fetch_sub(self.capacity, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for BufferedBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedBlock")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("pin_count", &self.pin_count())
            .finish()
    }
}

/// Owning reference to a buffered block.
///
/// The block's memory is released when the last owning handle drops.
/// Owning a block does not pin it.
#[derive(Clone, Debug)]
pub struct BlockHandle {
    block: Arc<BufferedBlock>,
}

impl BlockHandle {
    /// Returns the block id.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.block.id()
    }

    /// Returns the block capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.block.capacity()
    }

    /// Returns the current pin count, for verification.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.block.pin_count()
    }
}

/// A pin on a buffered block.
///
/// While a `BufferHandle` is live the block cannot go away; the pin is
/// released on drop.
pub struct BufferHandle {
    block: Arc<BufferedBlock>,
}

impl BufferHandle {
    /// Returns the pinned block id.
    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.block.id()
    }

    /// Returns a read guard over the block bytes.
    #[inline]
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Vec<u8>> {
        self.block.data.read()
    }

    /// Returns a write guard over the block bytes.
    #[inline]
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Vec<u8>> {
        self.block.data.write()
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        self.block.unpin();
    }
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("block_id", &self.block_id())
            .finish()
    }
}

/// Buffer manager statistics.
#[derive(Debug, Default)]
pub struct BufferStats {
    /// Total allocations served.
    pub allocations: AtomicU64,
    /// Total pins taken.
    pub pins: AtomicU64,
}

/// The buffer manager.
pub struct BufferManager {
    config: BufferConfig,
    /// Registry of live blocks. Entries are weak: a block dies when its
    /// last owning handle drops, and dead entries are swept periodically.
    blocks: RwLock<HashMap<i64, Weak<BufferedBlock>>>,
    next_id: AtomicI64,
    memory: Arc<MemoryState>,
    stats: BufferStats,
}

impl BufferManager {
    /// Creates a buffer manager with the given configuration.
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            blocks: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(0),
            memory: Arc::new(MemoryState::default()),
            stats: BufferStats::default(),
        }
    }

    /// Allocates a fresh zeroed block of the given capacity.
    pub fn allocate(&self, capacity: usize) -> StorageResult<BlockHandle> {
        if let Some(limit) = self.config.memory_limit {
            let used = self.memory.used.load(Ordering::Acquire);
            if used + capacity > limit {
                return Err(StorageError::OutOfMemory {
                    requested: capacity,
                    used,
                    limit,
                });
            }
        }
        self.memory.used.fetch_add(capacity, Ordering::AcqRel);

        let id = BlockId::new(self.next_id.fetch_add(1, Ordering::AcqRel));
        let block = Arc::new(BufferedBlock {
            id,
            capacity,
            data: RwLock::new(vec![0u8; capacity]),
            pin_count: AtomicU32::new(0),
            memory: Arc::clone(&self.memory),
        });

        let allocations = self.stats.allocations.fetch_add(1, Ordering::Relaxed) + 1;
        let mut blocks = self.blocks.write();
        if allocations % PRUNE_INTERVAL == 0 {
            blocks.retain(|_, weak| weak.strong_count() > 0);
        }
        blocks.insert(id.as_i64(), Arc::downgrade(&block));

        Ok(BlockHandle { block })
    }

    /// Pins a live block, keeping it resident until the handle drops.
    pub fn pin(&self, block_id: BlockId) -> StorageResult<BufferHandle> {
        let blocks = self.blocks.read();
        let block = blocks
            .get(&block_id.as_i64())
            .and_then(Weak::upgrade)
            .ok_or(StorageError::BlockNotFound { block_id })?;
        block.pin();
        self.stats.pins.fetch_add(1, Ordering::Relaxed);
        Ok(BufferHandle { block })
    }

    /// Returns buffer-managed memory currently in use, in bytes.
    #[must_use]
    pub fn memory_used(&self) -> usize {
        self.memory.used.load(Ordering::Acquire)
    }

    /// Returns the number of live blocks with a non-zero pin count.
    #[must_use]
    pub fn pinned_block_count(&self) -> usize {
        self.blocks
            .read()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|block| block.pin_count() > 0)
            .count()
    }

    /// Returns allocation/pin statistics.
    #[must_use]
    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("memory_used", &self.memory_used())
            .field("memory_limit", &self.config.memory_limit)
            .finish()
    }
}
