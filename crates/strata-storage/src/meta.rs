//! Meta-block streams.
//!
//! A meta-block stream is an append-only typed byte stream laid out over a
//! linked list of fixed-size blocks. The first 8 bytes of every block hold
//! the id of the next block in the chain (little-endian, -1 = end); the
//! rest is payload.
//!
//! The writer owns the currently-open block in memory. When a value does
//! not fit in the remaining payload a fresh block is allocated and its id
//! back-patched into the previous block before that block is written out.
//! Primitive values never straddle a block boundary; raw byte runs (and
//! therefore strings) may.

use std::sync::Arc;

use strata_common::constants::BLOCK_HEADER_SIZE;
use strata_common::types::BlockId;

use crate::block::BlockManager;
use crate::error::{StorageError, StorageResult};

// =============================================================================
// Writer
// =============================================================================

/// Append-only typed writer over a chain of meta blocks.
pub struct MetaBlockWriter {
    block_manager: Arc<dyn BlockManager>,
    /// In-memory image of the currently-open block.
    buffer: Vec<u8>,
    /// Id of the currently-open block.
    block: BlockId,
    /// Next write position within the open block.
    offset: usize,
}

impl MetaBlockWriter {
    /// Creates a writer positioned at the start of a freshly-allocated block.
    pub fn new(block_manager: Arc<dyn BlockManager>) -> StorageResult<Self> {
        let block = block_manager.allocate_block()?;
        let mut buffer = vec![0u8; block_manager.block_size()];
        buffer[..BLOCK_HEADER_SIZE].copy_from_slice(&BlockId::INVALID.to_le_bytes());
        Ok(Self {
            block_manager,
            buffer,
            block,
            offset: BLOCK_HEADER_SIZE,
        })
    }

    /// Id of the block currently being written.
    #[must_use]
    pub fn current_block(&self) -> BlockId {
        self.block
    }

    /// Write position within the current block.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    /// Closes the current block onto storage and opens a fresh one,
    /// back-patching the chain pointer.
    fn advance_block(&mut self) -> StorageResult<()> {
        let next = self.block_manager.allocate_block()?;
        self.buffer[..BLOCK_HEADER_SIZE].copy_from_slice(&next.to_le_bytes());
        self.block_manager.write_block(self.block, &self.buffer)?;

        self.buffer.fill(0);
        self.buffer[..BLOCK_HEADER_SIZE].copy_from_slice(&BlockId::INVALID.to_le_bytes());
        self.block = next;
        self.offset = BLOCK_HEADER_SIZE;
        Ok(())
    }

    /// Writes a raw byte run, spilling across blocks as needed.
    pub fn write_bytes(&mut self, mut data: &[u8]) -> StorageResult<()> {
        while !data.is_empty() {
            if self.remaining() == 0 {
                self.advance_block()?;
            }
            let n = data.len().min(self.remaining());
            self.buffer[self.offset..self.offset + n].copy_from_slice(&data[..n]);
            self.offset += n;
            data = &data[n..];
        }
        Ok(())
    }

    /// Writes a primitive whole; advances to a fresh block first if it
    /// would not fit contiguously.
    fn write_pod(&mut self, bytes: &[u8]) -> StorageResult<()> {
        if self.remaining() < bytes.len() {
            self.advance_block()?;
        }
        self.buffer[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        Ok(())
    }

    /// Writes a u8.
    pub fn write_u8(&mut self, value: u8) -> StorageResult<()> {
        self.write_pod(&[value])
    }

    /// Writes a bool as a single byte.
    pub fn write_bool(&mut self, value: bool) -> StorageResult<()> {
        self.write_u8(u8::from(value))
    }

    /// Writes a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a little-endian u64.
    pub fn write_u64(&mut self, value: u64) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a little-endian i32.
    pub fn write_i32(&mut self, value: i32) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a little-endian i64.
    pub fn write_i64(&mut self, value: i64) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a little-endian i128.
    pub fn write_i128(&mut self, value: i128) -> StorageResult<()> {
        self.write_pod(&value.to_le_bytes())
    }

    /// Writes a length-prefixed UTF-8 string (`u32` length + bytes).
    pub fn write_string(&mut self, value: &str) -> StorageResult<()> {
        self.write_u32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    /// Writes the current block to storage. The writer remains usable.
    pub fn flush(&mut self) -> StorageResult<()> {
        self.block_manager.write_block(self.block, &self.buffer)
    }
}

impl std::fmt::Debug for MetaBlockWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaBlockWriter")
            .field("block", &self.block)
            .field("offset", &self.offset)
            .finish()
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Typed reader over a chain of meta blocks, mirroring [`MetaBlockWriter`].
pub struct MetaBlockReader {
    block_manager: Arc<dyn BlockManager>,
    buffer: Vec<u8>,
    /// Chain pointer of the block currently loaded.
    next_block: BlockId,
    offset: usize,
}

impl MetaBlockReader {
    /// Opens a reader at the start of the given block's payload.
    pub fn new(block_manager: Arc<dyn BlockManager>, block_id: BlockId) -> StorageResult<Self> {
        let mut buffer = vec![0u8; block_manager.block_size()];
        block_manager.read_block(block_id, &mut buffer)?;
        let next_block = Self::chain_pointer(&buffer);
        Ok(Self {
            block_manager,
            buffer,
            next_block,
            offset: BLOCK_HEADER_SIZE,
        })
    }

    fn chain_pointer(buffer: &[u8]) -> BlockId {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buffer[..BLOCK_HEADER_SIZE]);
        BlockId::from_le_bytes(bytes)
    }

    /// Repositions the reader within the currently-loaded block.
    ///
    /// Used to land on a recorded `{block, offset}` position.
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset as usize;
    }

    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn advance_block(&mut self, reading: &'static str) -> StorageResult<()> {
        if !self.next_block.is_valid() {
            return Err(StorageError::UnexpectedEof { reading });
        }
        let next = self.next_block;
        self.block_manager.read_block(next, &mut self.buffer)?;
        self.next_block = Self::chain_pointer(&self.buffer);
        self.offset = BLOCK_HEADER_SIZE;
        Ok(())
    }

    /// Reads a raw byte run, following the chain as needed.
    pub fn read_bytes(&mut self, mut len: usize) -> StorageResult<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        while len > 0 {
            if self.remaining() == 0 {
                self.advance_block("byte run")?;
            }
            let n = len.min(self.remaining());
            out.extend_from_slice(&self.buffer[self.offset..self.offset + n]);
            self.offset += n;
            len -= n;
        }
        Ok(out)
    }

    /// Reads a primitive whole; skips to the next block first if the writer
    /// did (primitives never straddle blocks).
    fn read_pod<const N: usize>(&mut self, reading: &'static str) -> StorageResult<[u8; N]> {
        if self.remaining() < N {
            self.advance_block(reading)?;
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buffer[self.offset..self.offset + N]);
        self.offset += N;
        Ok(bytes)
    }

    /// Reads a u8.
    pub fn read_u8(&mut self) -> StorageResult<u8> {
        Ok(self.read_pod::<1>("u8")?[0])
    }

    /// Reads a bool.
    pub fn read_bool(&mut self) -> StorageResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> StorageResult<u16> {
        Ok(u16::from_le_bytes(self.read_pod("u16")?))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> StorageResult<u32> {
        Ok(u32::from_le_bytes(self.read_pod("u32")?))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> StorageResult<u64> {
        Ok(u64::from_le_bytes(self.read_pod("u64")?))
    }

    /// Reads a little-endian i32.
    pub fn read_i32(&mut self) -> StorageResult<i32> {
        Ok(i32::from_le_bytes(self.read_pod("i32")?))
    }

    /// Reads a little-endian i64.
    pub fn read_i64(&mut self) -> StorageResult<i64> {
        Ok(i64::from_le_bytes(self.read_pod("i64")?))
    }

    /// Reads a little-endian i128.
    pub fn read_i128(&mut self) -> StorageResult<i128> {
        Ok(i128::from_le_bytes(self.read_pod("i128")?))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> StorageResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl std::fmt::Debug for MetaBlockReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaBlockReader")
            .field("next_block", &self.next_block)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::InMemoryBlockManager;
    use strata_common::config::BlockConfig;

    fn small_manager() -> Arc<dyn BlockManager> {
        Arc::new(InMemoryBlockManager::new(
            &BlockConfig::default().with_block_size(4096),
        ))
    }

    #[test]
    fn test_typed_round_trip() {
        let manager = small_manager();
        let mut writer = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        let root = writer.current_block();

        writer.write_u8(7).unwrap();
        writer.write_u16(300).unwrap();
        writer.write_u32(70_000).unwrap();
        writer.write_u64(1 << 40).unwrap();
        writer.write_i64(-5).unwrap();
        writer.write_i128(-(1i128 << 100)).unwrap();
        writer.write_bool(true).unwrap();
        writer.write_string("hello stream").unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 300);
        assert_eq!(reader.read_u32().unwrap(), 70_000);
        assert_eq!(reader.read_u64().unwrap(), 1 << 40);
        assert_eq!(reader.read_i64().unwrap(), -5);
        assert_eq!(reader.read_i128().unwrap(), -(1i128 << 100));
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_string().unwrap(), "hello stream");
    }

    #[test]
    fn test_chain_across_blocks() {
        let manager = small_manager();
        let mut writer = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        let root = writer.current_block();

        // Write well past a single 4 KiB block.
        for i in 0..4096u32 {
            writer.write_u32(i).unwrap();
        }
        let long = "x".repeat(10_000);
        writer.write_string(&long).unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        for i in 0..4096u32 {
            assert_eq!(reader.read_u32().unwrap(), i);
        }
        assert_eq!(reader.read_string().unwrap(), long);
    }

    #[test]
    fn test_read_past_end_fails() {
        let manager = small_manager();
        let mut writer = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        let root = writer.current_block();
        writer.write_u32(1).unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        reader.read_u32().unwrap();
        // Skip to the end of the only block; the chain ends here.
        reader.seek(4096);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, StorageError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_two_independent_streams() {
        let manager = small_manager();
        let mut a = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        let mut b = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        let root_a = a.current_block();
        let root_b = b.current_block();

        for i in 0..2000u32 {
            a.write_u32(i).unwrap();
            b.write_u32(i * 2).unwrap();
        }
        a.flush().unwrap();
        b.flush().unwrap();

        let mut ra = MetaBlockReader::new(Arc::clone(&manager), root_a).unwrap();
        let mut rb = MetaBlockReader::new(manager, root_b).unwrap();
        for i in 0..2000u32 {
            assert_eq!(ra.read_u32().unwrap(), i);
            assert_eq!(rb.read_u32().unwrap(), i * 2);
        }
    }

    #[test]
    fn test_seek_to_recorded_offset() {
        let manager = small_manager();
        let mut writer = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        writer.write_u64(0xAAAA).unwrap();

        let block = writer.current_block();
        let offset = writer.offset();
        writer.write_string("payload at offset").unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, block).unwrap();
        reader.seek(offset);
        assert_eq!(reader.read_string().unwrap(), "payload at offset");
    }
}
