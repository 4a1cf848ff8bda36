//! Collection segments.
//!
//! A segment is a contiguous run of chunks sharing one column layout. It
//! owns three tables: blocks (buffer-managed storage), vectors (where each
//! materialized vector's bytes live and how vectors chain together), and
//! chunks (which vectors make up each appended chunk).
//!
//! Cross-references between tables are plain indices, never ownership
//! edges: a chunk names its column vectors by index, a vector names its
//! child (nested types) and its continuation or sibling (`next_data`) by
//! index, and every vector names its block by segment-local index.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use strata_common::constants::INVALID_INDEX;
use strata_common::types::{BlockId, LogicalType, Value};
use strata_storage::{BlockHandle, BufferHandle, BufferManager};

use crate::chunk::DataChunk;
use crate::error::{ColumnError, ColumnResult};
use crate::layout;

/// Where one materialized vector piece lives.
#[derive(Debug, Clone, Copy)]
pub struct VectorMetaData {
    /// Segment-local index into the block table.
    pub block_id: u32,
    /// Byte offset within the block.
    pub offset: u32,
    /// Rows in this piece; for list vectors, the total flattened element
    /// count instead (the row count comes from the enclosing chunk).
    pub count: u16,
    /// Head of the child vector for nested types (`INVALID_INDEX` = none).
    pub child_data: usize,
    /// Continuation piece, or next sibling for struct children
    /// (`INVALID_INDEX` = none).
    pub next_data: usize,
}

/// One appended chunk.
#[derive(Debug, Clone)]
pub struct ChunkMetaData {
    /// Head vector index per column.
    pub vector_data: Vec<usize>,
    /// Every segment-local block index referenced by this chunk.
    pub block_ids: HashSet<u32>,
    /// Rows in the chunk.
    pub count: u16,
}

/// One buffer-managed block owned by a segment.
#[derive(Debug)]
pub struct BlockMetaData {
    /// Owning reference keeping the block alive.
    pub handle: BlockHandle,
    /// Bytes handed out so far.
    pub used: u32,
    /// Total capacity in bytes.
    pub capacity: u32,
}

/// Live pins held on behalf of an append or scan.
///
/// Dropping the state releases every pin.
#[derive(Debug, Default)]
pub struct ChunkManagementState {
    pub(crate) handles: HashMap<BlockId, BufferHandle>,
}

impl ChunkManagementState {
    /// Number of blocks currently pinned through this state.
    #[must_use]
    pub fn pinned_block_count(&self) -> usize {
        self.handles.len()
    }

    /// Releases all pins.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

struct Allocation {
    block_idx: u32,
    offset: u32,
}

struct WrittenVector {
    head: usize,
    tail: usize,
}

/// Rollback marks captured at append entry.
pub(crate) struct SegmentMarks {
    blocks: usize,
    vectors: usize,
    chunks: usize,
    last_block_used: Option<u32>,
    count: usize,
}

/// A contiguous run of chunks with identical schema.
pub struct ColumnDataCollectionSegment {
    buffer_manager: Arc<BufferManager>,
    block_size: usize,
    types: Vec<LogicalType>,
    blocks: Vec<BlockMetaData>,
    vectors: Vec<VectorMetaData>,
    chunks: Vec<ChunkMetaData>,
    count: usize,
}

impl ColumnDataCollectionSegment {
    pub(crate) fn new(
        buffer_manager: Arc<BufferManager>,
        block_size: usize,
        types: Vec<LogicalType>,
    ) -> Self {
        Self {
            buffer_manager,
            block_size,
            types,
            blocks: Vec::new(),
            vectors: Vec::new(),
            chunks: Vec::new(),
            count: 0,
        }
    }

    /// Rows stored in this segment.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Chunks stored in this segment.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // -------------------------------------------------------------------------
    // Append path
    // -------------------------------------------------------------------------

    /// Appends a chunk, rolling back all table growth on failure.
    pub(crate) fn append_chunk(
        &mut self,
        state: &mut ChunkManagementState,
        chunk: &DataChunk,
    ) -> ColumnResult<()> {
        let marks = self.save_marks();
        let result = self.append_chunk_inner(state, chunk);
        if result.is_err() {
            self.restore_marks(marks);
            // Pins taken for now-truncated blocks must not keep them alive.
            state.clear();
        }
        result
    }

    fn append_chunk_inner(
        &mut self,
        state: &mut ChunkManagementState,
        chunk: &DataChunk,
    ) -> ColumnResult<()> {
        let mut meta = ChunkMetaData {
            vector_data: Vec::with_capacity(chunk.column_count()),
            block_ids: HashSet::new(),
            count: chunk.len() as u16,
        };
        let types = self.types.clone();
        for (col, ty) in types.iter().enumerate() {
            let written =
                self.write_vector(state, ty, chunk.column(col).values(), &mut meta.block_ids)?;
            meta.vector_data.push(written.head);
        }
        self.chunks.push(meta);
        self.count += chunk.len();
        Ok(())
    }

    fn save_marks(&self) -> SegmentMarks {
        SegmentMarks {
            blocks: self.blocks.len(),
            vectors: self.vectors.len(),
            chunks: self.chunks.len(),
            last_block_used: self.blocks.last().map(|b| b.used),
            count: self.count,
        }
    }

    fn restore_marks(&mut self, marks: SegmentMarks) {
        self.blocks.truncate(marks.blocks);
        self.vectors.truncate(marks.vectors);
        self.chunks.truncate(marks.chunks);
        if let (Some(used), Some(last)) = (marks.last_block_used, self.blocks.last_mut()) {
            last.used = used;
        }
        self.count = marks.count;
    }

    fn write_vector(
        &mut self,
        state: &mut ChunkManagementState,
        ty: &LogicalType,
        values: &[Value],
        block_ids: &mut HashSet<u32>,
    ) -> ColumnResult<WrittenVector> {
        match ty {
            LogicalType::Varchar => self.write_chained(state, ty, values, block_ids),
            LogicalType::List(element) => {
                let element = element.as_ref().clone();
                self.write_list(state, &element, values, block_ids)
            }
            LogicalType::Map { key, value } => {
                let entry = LogicalType::map_entry_type(key, value);
                self.write_list(state, &entry, values, block_ids)
            }
            LogicalType::Struct(children) => {
                let children = children.clone();
                self.write_struct(state, &children, values, block_ids)
            }
            _ => self.write_chained(state, ty, values, block_ids),
        }
    }

    /// Writes a fixed-width or varchar vector, splitting it into chained
    /// pieces whenever its bytes would span block boundaries.
    fn write_chained(
        &mut self,
        state: &mut ChunkManagementState,
        ty: &LogicalType,
        values: &[Value],
        block_ids: &mut HashSet<u32>,
    ) -> ColumnResult<WrittenVector> {
        debug_assert!(!values.is_empty());
        let mut head = INVALID_INDEX;
        let mut prev = INVALID_INDEX;
        let mut row = 0;
        while row < values.len() {
            let rest = &values[row..];
            let mut take = Self::rows_that_fit(ty, rest, self.last_block_free())?;
            if take == 0 {
                take = Self::rows_that_fit(ty, rest, self.block_size)?;
            }
            if take == 0 {
                // A single row larger than a whole block gets its own
                // oversized allocation.
                take = 1;
            }
            take = take.min(u16::MAX as usize);
            let piece = &rest[..take];

            let size = Self::piece_size(ty, piece)?;
            let mut buf = vec![0u8; size];
            match ty {
                LogicalType::Varchar => layout::encode_varchar_piece(&mut buf, piece)?,
                _ => layout::encode_fixed_piece(&mut buf, ty, piece)?,
            }
            let alloc = self.allocate_space(size)?;
            self.write_to_block(state, &alloc, &buf)?;
            block_ids.insert(alloc.block_idx);

            let idx = self.vectors.len();
            self.vectors.push(VectorMetaData {
                block_id: alloc.block_idx,
                offset: alloc.offset,
                count: take as u16,
                child_data: INVALID_INDEX,
                next_data: INVALID_INDEX,
            });
            if head == INVALID_INDEX {
                head = idx;
            } else {
                self.vectors[prev].next_data = idx;
            }
            prev = idx;
            row += take;
        }
        Ok(WrittenVector { head, tail: prev })
    }

    fn write_list(
        &mut self,
        state: &mut ChunkManagementState,
        element: &LogicalType,
        values: &[Value],
        block_ids: &mut HashSet<u32>,
    ) -> ColumnResult<WrittenVector> {
        let rows = values.len();
        let size = layout::list_piece_size(rows);
        let mut buf = vec![0u8; size];
        let total = layout::encode_list_entries(&mut buf, values)?;
        if total > u16::MAX as usize {
            return Err(ColumnError::ListTooLarge { elements: total });
        }
        let alloc = self.allocate_space(size)?;
        self.write_to_block(state, &alloc, &buf)?;
        block_ids.insert(alloc.block_idx);

        let head = self.vectors.len();
        self.vectors.push(VectorMetaData {
            block_id: alloc.block_idx,
            offset: alloc.offset,
            count: total as u16,
            child_data: INVALID_INDEX,
            next_data: INVALID_INDEX,
        });

        if total > 0 {
            let mut flat = Vec::with_capacity(total);
            for value in values {
                if let Value::List(items) = value {
                    flat.extend(items.iter().cloned());
                }
            }
            let child = self.write_vector(state, element, &flat, block_ids)?;
            self.vectors[head].child_data = child.head;
        }
        Ok(WrittenVector { head, tail: head })
    }

    fn write_struct(
        &mut self,
        state: &mut ChunkManagementState,
        children: &[(String, LogicalType)],
        values: &[Value],
        block_ids: &mut HashSet<u32>,
    ) -> ColumnResult<WrittenVector> {
        let rows = values.len();
        let size = layout::validity_bytes(rows);
        let mut buf = vec![0u8; size];
        layout::write_validity(&mut buf, values);
        let alloc = self.allocate_space(size)?;
        self.write_to_block(state, &alloc, &buf)?;
        block_ids.insert(alloc.block_idx);

        let head = self.vectors.len();
        self.vectors.push(VectorMetaData {
            block_id: alloc.block_idx,
            offset: alloc.offset,
            count: rows as u16,
            child_data: INVALID_INDEX,
            next_data: INVALID_INDEX,
        });

        // Children form a sibling list: the struct points at the first
        // child's head, and each child's last piece points at the next
        // sibling's head.
        let mut prev_tail = INVALID_INDEX;
        for (i, (_, child_ty)) in children.iter().enumerate() {
            let field_values: Vec<Value> = values
                .iter()
                .map(|v| match v {
                    Value::Struct(fields) => fields.get(i).cloned().unwrap_or(Value::Null),
                    _ => Value::Null,
                })
                .collect();
            let written = self.write_vector(state, child_ty, &field_values, block_ids)?;
            if i == 0 {
                self.vectors[head].child_data = written.head;
            } else {
                self.vectors[prev_tail].next_data = written.head;
            }
            prev_tail = written.tail;
        }
        Ok(WrittenVector { head, tail: head })
    }

    fn piece_size(ty: &LogicalType, piece: &[Value]) -> ColumnResult<usize> {
        match ty {
            LogicalType::Varchar => Ok(layout::varchar_piece_size(piece)),
            _ => layout::fixed_piece_size(ty, piece.len()),
        }
    }

    /// Largest row prefix of `values` whose encoded piece fits in `avail`
    /// bytes.
    fn rows_that_fit(ty: &LogicalType, values: &[Value], avail: usize) -> ColumnResult<usize> {
        match ty.fixed_width() {
            Some(width) => {
                let mut n = values.len().min(avail * 8 / (8 * width + 1));
                while n > 0 && layout::validity_bytes(n) + n * width > avail {
                    n -= 1;
                }
                Ok(n)
            }
            None => {
                let mut bytes = 0usize;
                let mut n = 0usize;
                for value in values {
                    let entry = 4 + match value {
                        Value::Varchar(s) => s.len(),
                        _ => 0,
                    };
                    if layout::validity_bytes(n + 1) + bytes + entry > avail {
                        break;
                    }
                    bytes += entry;
                    n += 1;
                }
                Ok(n)
            }
        }
    }

    fn last_block_free(&self) -> usize {
        self.blocks
            .last()
            .map(|b| (b.capacity - b.used) as usize)
            .unwrap_or(0)
    }

    fn allocate_space(&mut self, size: usize) -> ColumnResult<Allocation> {
        if let Some(last) = self.blocks.last_mut() {
            if last.used as usize + size <= last.capacity as usize {
                let offset = last.used;
                last.used += size as u32;
                return Ok(Allocation {
                    block_idx: (self.blocks.len() - 1) as u32,
                    offset,
                });
            }
        }
        let capacity = size.max(self.block_size);
        let handle = self.buffer_manager.allocate(capacity)?;
        self.blocks.push(BlockMetaData {
            handle,
            used: size as u32,
            capacity: capacity as u32,
        });
        Ok(Allocation {
            block_idx: (self.blocks.len() - 1) as u32,
            offset: 0,
        })
    }

    fn pin_block<'a>(
        &self,
        state: &'a mut ChunkManagementState,
        block_idx: u32,
    ) -> ColumnResult<&'a BufferHandle> {
        let id = self.blocks[block_idx as usize].handle.id();
        match state.handles.entry(id) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let pin = self.buffer_manager.pin(id)?;
                Ok(entry.insert(pin))
            }
        }
    }

    fn write_to_block(
        &self,
        state: &mut ChunkManagementState,
        alloc: &Allocation,
        data: &[u8],
    ) -> ColumnResult<()> {
        let handle = self.pin_block(state, alloc.block_idx)?;
        let mut guard = handle.data_mut();
        let start = alloc.offset as usize;
        guard[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scan path
    // -------------------------------------------------------------------------

    /// Reads chunk `chunk_idx` into `result`, pinning exactly the blocks the
    /// chunk references.
    pub(crate) fn read_chunk(
        &self,
        chunk_idx: usize,
        state: &mut ChunkManagementState,
        result: &mut DataChunk,
    ) -> ColumnResult<()> {
        let chunk = &self.chunks[chunk_idx];
        state.handles.clear();
        for &block_idx in &chunk.block_ids {
            self.pin_block(state, block_idx)?;
        }

        result.reset();
        let rows = chunk.count as usize;
        for (col, ty) in self.types.iter().enumerate() {
            let (values, _) = self.read_vector(state, ty, chunk.vector_data[col], rows)?;
            result.load_column(col, values);
        }
        result.set_cardinality(rows);
        Ok(())
    }

    fn read_vector(
        &self,
        state: &mut ChunkManagementState,
        ty: &LogicalType,
        head: usize,
        rows: usize,
    ) -> ColumnResult<(Vec<Value>, usize)> {
        match ty {
            LogicalType::Varchar => self.read_chained(state, ty, head, rows),
            LogicalType::List(element) => self.read_list(state, element, head, rows),
            LogicalType::Map { key, value } => {
                let entry = LogicalType::map_entry_type(key, value);
                self.read_list(state, &entry, head, rows)
            }
            LogicalType::Struct(children) => self.read_struct(state, children, head, rows),
            _ => self.read_chained(state, ty, head, rows),
        }
    }

    fn read_chained(
        &self,
        state: &mut ChunkManagementState,
        ty: &LogicalType,
        head: usize,
        rows: usize,
    ) -> ColumnResult<(Vec<Value>, usize)> {
        let mut values = Vec::with_capacity(rows);
        let mut idx = head;
        let mut tail = head;
        while values.len() < rows {
            if idx == INVALID_INDEX {
                return Err(ColumnError::internal(
                    "vector chain ended before all rows were read",
                ));
            }
            let meta = self.vectors[idx];
            let piece_rows = meta.count as usize;
            let piece = match ty {
                LogicalType::Varchar => {
                    // Read the lengths first to learn the payload size.
                    let prefix_len = layout::validity_bytes(piece_rows) + piece_rows * 4;
                    let prefix =
                        self.read_block_range(state, meta.block_id, meta.offset, prefix_len)?;
                    let mut bytes = 0usize;
                    for row in 0..piece_rows {
                        let mut b4 = [0u8; 4];
                        let at = layout::validity_bytes(piece_rows) + row * 4;
                        b4.copy_from_slice(&prefix[at..at + 4]);
                        bytes += u32::from_le_bytes(b4) as usize;
                    }
                    let full = self.read_block_range(
                        state,
                        meta.block_id,
                        meta.offset,
                        prefix_len + bytes,
                    )?;
                    layout::decode_varchar_piece(&full, piece_rows)?
                }
                _ => {
                    let size = layout::fixed_piece_size(ty, piece_rows)?;
                    let src = self.read_block_range(state, meta.block_id, meta.offset, size)?;
                    layout::decode_fixed_piece(&src, ty, piece_rows)?
                }
            };
            values.extend(piece);
            tail = idx;
            idx = meta.next_data;
        }
        if values.len() > rows {
            return Err(ColumnError::internal(
                "vector chain holds more rows than the chunk",
            ));
        }
        Ok((values, tail))
    }

    fn read_list(
        &self,
        state: &mut ChunkManagementState,
        element: &LogicalType,
        head: usize,
        rows: usize,
    ) -> ColumnResult<(Vec<Value>, usize)> {
        let meta = self.vectors[head];
        let total = meta.count as usize;
        let src =
            self.read_block_range(state, meta.block_id, meta.offset, layout::list_piece_size(rows))?;
        let entries = layout::decode_list_entries(&src, rows);

        let child_values = if meta.child_data == INVALID_INDEX {
            Vec::new()
        } else {
            self.read_vector(state, element, meta.child_data, total)?.0
        };

        let mut values = Vec::with_capacity(rows);
        for entry in entries {
            match entry {
                None => values.push(Value::Null),
                Some((offset, len)) => {
                    values.push(Value::List(child_values[offset..offset + len].to_vec()));
                }
            }
        }
        Ok((values, head))
    }

    fn read_struct(
        &self,
        state: &mut ChunkManagementState,
        children: &[(String, LogicalType)],
        head: usize,
        rows: usize,
    ) -> ColumnResult<(Vec<Value>, usize)> {
        let meta = self.vectors[head];
        let validity =
            self.read_block_range(state, meta.block_id, meta.offset, layout::validity_bytes(rows))?;

        let mut fields: Vec<Vec<Value>> = Vec::with_capacity(children.len());
        let mut idx = meta.child_data;
        for (_, child_ty) in children {
            if idx == INVALID_INDEX {
                return Err(ColumnError::internal("struct vector is missing a child"));
            }
            let (child_values, tail) = self.read_vector(state, child_ty, idx, rows)?;
            fields.push(child_values);
            idx = self.vectors[tail].next_data;
        }

        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            if !layout::bit_is_set(&validity, row) {
                values.push(Value::Null);
            } else {
                values.push(Value::Struct(
                    fields.iter().map(|f| f[row].clone()).collect(),
                ));
            }
        }
        Ok((values, head))
    }

    fn read_block_range(
        &self,
        state: &mut ChunkManagementState,
        block_idx: u32,
        offset: u32,
        len: usize,
    ) -> ColumnResult<Vec<u8>> {
        let handle = self.pin_block(state, block_idx)?;
        let guard = handle.data();
        let start = offset as usize;
        Ok(guard[start..start + len].to_vec())
    }

    // -------------------------------------------------------------------------
    // Verification
    // -------------------------------------------------------------------------

    /// Checks the segment invariants.
    pub fn verify(&self) -> ColumnResult<()> {
        let chunk_total: usize = self.chunks.iter().map(|c| c.count as usize).sum();
        if chunk_total != self.count {
            return Err(ColumnError::internal(format!(
                "segment count {} does not match chunk total {chunk_total}",
                self.count
            )));
        }
        for block in &self.blocks {
            if block.used > block.capacity {
                return Err(ColumnError::internal("block used exceeds capacity"));
            }
        }
        for chunk in &self.chunks {
            let reachable = self.reachable_blocks(&chunk.vector_data)?;
            if reachable != chunk.block_ids {
                return Err(ColumnError::internal(
                    "chunk block-id set does not match reachable blocks",
                ));
            }
        }
        Ok(())
    }

    /// Collects every block index reachable from the given vector heads by
    /// walking child and continuation/sibling edges.
    fn reachable_blocks(&self, heads: &[usize]) -> ColumnResult<HashSet<u32>> {
        let mut reachable = HashSet::new();
        let mut stack: Vec<usize> = heads.to_vec();
        let mut visited = HashSet::new();
        while let Some(idx) = stack.pop() {
            if idx == INVALID_INDEX || !visited.insert(idx) {
                continue;
            }
            let meta = self
                .vectors
                .get(idx)
                .ok_or_else(|| ColumnError::internal("vector index out of range"))?;
            reachable.insert(meta.block_id);
            stack.push(meta.child_data);
            stack.push(meta.next_data);
        }
        Ok(reachable)
    }
}

impl std::fmt::Debug for ColumnDataCollectionSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDataCollectionSegment")
            .field("count", &self.count)
            .field("chunks", &self.chunks.len())
            .field("vectors", &self.vectors.len())
            .field("blocks", &self.blocks.len())
            .finish()
    }
}
