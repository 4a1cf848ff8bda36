//! Buffer-managed columnar collection.
//!
//! A [`ColumnDataCollection`] materializes appended chunks into
//! buffer-managed blocks and scans them back out. Appends are
//! single-writer; scans are read-only and may run concurrently once no
//! append is in progress. All pins taken on behalf of an append or scan
//! live in the state object and are released when it drops.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use strata_common::constants::{DEFAULT_BLOCK_SIZE, SEGMENT_CHUNK_CAPACITY};
use strata_common::types::LogicalType;
use strata_storage::BufferManager;

use crate::chunk::DataChunk;
use crate::error::{ColumnError, ColumnResult};
use crate::segment::{ChunkManagementState, ColumnDataCollectionSegment};

/// State for a run of appends to one collection.
#[derive(Debug, Default)]
pub struct ColumnDataAppendState {
    /// Pins on the blocks the append is currently writing into.
    pub current_chunk_state: ChunkManagementState,
}

/// State for a scan over one collection.
#[derive(Debug, Default)]
pub struct ColumnDataScanState {
    /// Pins on the blocks referenced by the most recently emitted chunk.
    pub current_chunk_state: ChunkManagementState,
    segment_index: usize,
    chunk_index: usize,
}

/// A set of buffer-managed data stored in columnar format.
pub struct ColumnDataCollection {
    buffer_manager: Arc<BufferManager>,
    block_size: usize,
    types: Vec<LogicalType>,
    count: usize,
    segments: Vec<ColumnDataCollectionSegment>,
}

impl ColumnDataCollection {
    /// Creates an empty collection for rows of the given types.
    #[must_use]
    pub fn new(buffer_manager: Arc<BufferManager>, types: Vec<LogicalType>) -> Self {
        Self::with_block_size(buffer_manager, types, DEFAULT_BLOCK_SIZE)
    }

    /// Creates a collection whose segments allocate blocks of `block_size`
    /// bytes. Small sizes are useful to exercise block-boundary handling.
    #[must_use]
    pub fn with_block_size(
        buffer_manager: Arc<BufferManager>,
        types: Vec<LogicalType>,
        block_size: usize,
    ) -> Self {
        Self {
            buffer_manager,
            block_size,
            types,
            count: 0,
            segments: Vec::new(),
        }
    }

    /// Returns the column types.
    #[must_use]
    pub fn types(&self) -> &[LogicalType] {
        &self.types
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.types.len()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the number of stored chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.segments.iter().map(|s| s.chunk_count()).sum()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns the buffer manager backing this collection.
    #[must_use]
    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.buffer_manager
    }

    // -------------------------------------------------------------------------
    // Append
    // -------------------------------------------------------------------------

    /// Prepares an append state. No I/O happens here.
    pub fn initialize_append(&self, state: &mut ColumnDataAppendState) {
        state.current_chunk_state.clear();
    }

    /// Appends a chunk using the given state, reusing pinned blocks across
    /// calls.
    pub fn append(
        &mut self,
        state: &mut ColumnDataAppendState,
        chunk: &DataChunk,
    ) -> ColumnResult<()> {
        self.check_chunk_schema(chunk)?;
        if chunk.is_empty() {
            return Ok(());
        }

        if self
            .segments
            .last()
            .map(|s| s.chunk_count() >= SEGMENT_CHUNK_CAPACITY)
            .unwrap_or(true)
        {
            self.create_segment(state);
        }
        // A segment always exists at this point.
        let segment_idx = self.segments.len() - 1;
        self.segments[segment_idx].append_chunk(&mut state.current_chunk_state, chunk)?;
        self.count += chunk.len();
        Ok(())
    }

    /// Appends a chunk through a transient append state.
    pub fn append_chunk(&mut self, chunk: &DataChunk) -> ColumnResult<()> {
        let mut state = ColumnDataAppendState::default();
        self.initialize_append(&mut state);
        self.append(&mut state, chunk)
    }

    fn create_segment(&mut self, state: &mut ColumnDataAppendState) {
        debug!(
            segment = self.segments.len(),
            rows = self.count,
            "starting new collection segment"
        );
        // Pins from the previous segment are no longer useful.
        state.current_chunk_state.clear();
        self.segments.push(ColumnDataCollectionSegment::new(
            Arc::clone(&self.buffer_manager),
            self.block_size,
            self.types.clone(),
        ));
    }

    fn check_chunk_schema(&self, chunk: &DataChunk) -> ColumnResult<()> {
        let chunk_types = chunk.types();
        if chunk_types.len() != self.types.len() {
            return Err(ColumnError::ColumnCountMismatch {
                expected: self.types.len(),
                actual: chunk_types.len(),
            });
        }
        for (column, (expected, actual)) in
            self.types.iter().zip(chunk_types.iter()).enumerate()
        {
            if expected != actual {
                return Err(ColumnError::SchemaMismatch {
                    column,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Scan
    // -------------------------------------------------------------------------

    /// Prepares a scan state positioned at the first chunk.
    pub fn initialize_scan(&self, state: &mut ColumnDataScanState) {
        state.current_chunk_state.clear();
        state.segment_index = 0;
        state.chunk_index = 0;
    }

    /// Reads the next chunk into `result`; an empty `result` signals the end
    /// of the collection. Scans acquire pins on exactly the blocks the
    /// emitted chunk references.
    pub fn scan(&self, state: &mut ColumnDataScanState, result: &mut DataChunk) -> ColumnResult<()> {
        if result.types() != self.types {
            result.initialize(&self.types);
        }
        loop {
            let Some(segment) = self.segments.get(state.segment_index) else {
                result.reset();
                state.current_chunk_state.clear();
                return Ok(());
            };
            if state.chunk_index >= segment.chunk_count() {
                state.segment_index += 1;
                state.chunk_index = 0;
                continue;
            }
            segment.read_chunk(state.chunk_index, &mut state.current_chunk_state, result)?;
            state.chunk_index += 1;
            return Ok(());
        }
    }

    // -------------------------------------------------------------------------
    // Combine / reset / verify
    // -------------------------------------------------------------------------

    /// Moves all segments of `other` into `self`, in order, leaving `other`
    /// empty. O(1) in chunks; no data is copied or re-encoded.
    pub fn combine(&mut self, other: &mut ColumnDataCollection) -> ColumnResult<()> {
        if self.types != other.types {
            let column = self
                .types
                .iter()
                .zip(other.types.iter())
                .position(|(a, b)| a != b)
                .unwrap_or(self.types.len().min(other.types.len()));
            return Err(ColumnError::SchemaMismatch {
                column,
                expected: self
                    .types
                    .get(column)
                    .cloned()
                    .unwrap_or(LogicalType::Varchar),
                actual: other
                    .types
                    .get(column)
                    .cloned()
                    .unwrap_or(LogicalType::Varchar),
            });
        }
        self.segments.append(&mut other.segments);
        self.count += other.count;
        other.count = 0;
        Ok(())
    }

    /// Destroys all segments; the collection becomes empty.
    pub fn reset(&mut self) {
        self.segments.clear();
        self.count = 0;
    }

    /// Checks the collection invariants.
    pub fn verify(&self) -> ColumnResult<()> {
        let mut total = 0;
        for segment in &self.segments {
            segment.verify()?;
            total += segment.count();
        }
        if total != self.count {
            return Err(ColumnError::internal(format!(
                "collection count {} does not match segment total {total}",
                self.count
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ColumnDataCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDataCollection")
            .field("types", &self.types)
            .field("count", &self.count)
            .field("segments", &self.segments.len())
            .finish()
    }
}

impl fmt::Display for ColumnDataCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ColumnDataCollection ({} rows, {} chunks, {} segments)",
            self.count,
            self.chunk_count(),
            self.segment_count()
        )?;
        let mut state = ColumnDataScanState::default();
        self.initialize_scan(&mut state);
        let mut chunk = DataChunk::default();
        let mut shown = 0usize;
        while shown < 10 {
            if self.scan(&mut state, &mut chunk).is_err() {
                break;
            }
            if chunk.is_empty() {
                break;
            }
            write!(f, "{chunk}")?;
            shown += chunk.len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::config::BufferConfig;
    use strata_common::types::Value;

    fn buffer_manager() -> Arc<BufferManager> {
        Arc::new(BufferManager::new(BufferConfig::default()))
    }

    fn int_chunk(range: std::ops::Range<i32>) -> DataChunk {
        let mut chunk = DataChunk::from_types(&[LogicalType::Int32]);
        for i in range {
            chunk.append_row(&[Value::Int32(i)]).unwrap();
        }
        chunk
    }

    fn collect_all(collection: &ColumnDataCollection) -> Vec<Value> {
        let mut state = ColumnDataScanState::default();
        collection.initialize_scan(&mut state);
        let mut chunk = DataChunk::default();
        let mut out = Vec::new();
        loop {
            collection.scan(&mut state, &mut chunk).unwrap();
            if chunk.is_empty() {
                break;
            }
            for row in 0..chunk.len() {
                out.push(chunk.value(0, row).clone());
            }
        }
        out
    }

    #[test]
    fn test_append_scan_round_trip() {
        let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int32]);
        collection.append_chunk(&int_chunk(0..100)).unwrap();
        collection.append_chunk(&int_chunk(100..250)).unwrap();
        collection.verify().unwrap();

        assert_eq!(collection.count(), 250);
        assert_eq!(collection.chunk_count(), 2);
        let values = collect_all(&collection);
        assert_eq!(values.len(), 250);
        for (i, value) in values.iter().enumerate() {
            assert_eq!(value, &Value::Int32(i as i32));
        }
    }

    #[test]
    fn test_empty_chunk_is_a_no_op() {
        let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int32]);
        collection.append_chunk(&int_chunk(0..0)).unwrap();
        assert_eq!(collection.count(), 0);
        assert_eq!(collection.segment_count(), 0);
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int64]);
        let err = collection.append_chunk(&int_chunk(0..5)).unwrap_err();
        assert!(matches!(err, ColumnError::SchemaMismatch { column: 0, .. }));
    }

    #[test]
    fn test_segment_rollover() {
        let mut collection = ColumnDataCollection::new(buffer_manager(), vec![LogicalType::Int32]);
        let mut state = ColumnDataAppendState::default();
        collection.initialize_append(&mut state);
        for i in 0..(SEGMENT_CHUNK_CAPACITY + 3) {
            let chunk = int_chunk(i as i32..i as i32 + 1);
            collection.append(&mut state, &chunk).unwrap();
        }
        assert_eq!(collection.segment_count(), 2);
        assert_eq!(collection.count(), SEGMENT_CHUNK_CAPACITY + 3);
        collection.verify().unwrap();
    }

    #[test]
    fn test_combine() {
        let manager = buffer_manager();
        let mut a =
            ColumnDataCollection::new(Arc::clone(&manager), vec![LogicalType::Int32]);
        let mut b = ColumnDataCollection::new(manager, vec![LogicalType::Int32]);
        a.append_chunk(&int_chunk(0..10)).unwrap();
        b.append_chunk(&int_chunk(10..30)).unwrap();

        a.combine(&mut b).unwrap();
        assert_eq!(a.count(), 30);
        assert_eq!(b.count(), 0);
        assert_eq!(b.segment_count(), 0);
        a.verify().unwrap();

        let values = collect_all(&a);
        assert_eq!(values.len(), 30);
        for (i, value) in values.iter().enumerate() {
            assert_eq!(value, &Value::Int32(i as i32));
        }
    }

    #[test]
    fn test_combine_with_empty_is_a_no_op() {
        let manager = buffer_manager();
        let mut a =
            ColumnDataCollection::new(Arc::clone(&manager), vec![LogicalType::Int32]);
        let mut b = ColumnDataCollection::new(manager, vec![LogicalType::Int32]);
        a.append_chunk(&int_chunk(0..10)).unwrap();

        a.combine(&mut b).unwrap();
        assert_eq!(a.count(), 10);
        assert_eq!(collect_all(&a).len(), 10);
    }

    #[test]
    fn test_combine_type_mismatch() {
        let manager = buffer_manager();
        let mut a =
            ColumnDataCollection::new(Arc::clone(&manager), vec![LogicalType::Int32]);
        let mut b = ColumnDataCollection::new(manager, vec![LogicalType::Varchar]);
        let err = a.combine(&mut b).unwrap_err();
        assert!(matches!(err, ColumnError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_reset() {
        let manager = buffer_manager();
        let mut collection =
            ColumnDataCollection::new(Arc::clone(&manager), vec![LogicalType::Int32]);
        collection.append_chunk(&int_chunk(0..100)).unwrap();
        assert!(manager.memory_used() > 0);

        collection.reset();
        assert_eq!(collection.count(), 0);
        assert_eq!(collection.chunk_count(), 0);
        // Segment teardown released the backing blocks.
        assert_eq!(manager.memory_used(), 0);

        collection.append_chunk(&int_chunk(0..5)).unwrap();
        assert_eq!(collection.count(), 5);
    }

    #[test]
    fn test_scan_pins_released_between_chunks() {
        let manager = buffer_manager();
        let mut collection = ColumnDataCollection::with_block_size(
            Arc::clone(&manager),
            vec![LogicalType::Int32],
            4096,
        );
        collection.append_chunk(&int_chunk(0..500)).unwrap();
        collection.append_chunk(&int_chunk(500..1000)).unwrap();

        let mut state = ColumnDataScanState::default();
        collection.initialize_scan(&mut state);
        let mut chunk = DataChunk::default();
        collection.scan(&mut state, &mut chunk).unwrap();
        assert!(state.current_chunk_state.pinned_block_count() > 0);

        // Exhaust the scan; the final empty result carries no pins.
        loop {
            collection.scan(&mut state, &mut chunk).unwrap();
            if chunk.is_empty() {
                break;
            }
        }
        assert_eq!(state.current_chunk_state.pinned_block_count(), 0);
        assert_eq!(manager.pinned_block_count(), 0);
    }
}
