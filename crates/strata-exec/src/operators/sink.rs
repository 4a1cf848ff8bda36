//! Collecting and counting sinks.
//!
//! Both sinks buffer into thread-local state and merge into the shared
//! global state at `combine`, so `sink` itself never takes a lock. Both
//! declare input order irrelevant, which is what allows compaction caches
//! in front of them.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use strata_column::{ColumnDataAppendState, ColumnDataCollection, DataChunk};
use strata_common::types::LogicalType;
use strata_storage::BufferManager;

use crate::context::ClientContext;
use crate::error::{ExecError, ExecResult};
use crate::operator::{GlobalSinkState, LocalSinkState, SinkOperator, SinkResult};

// =============================================================================
// CollectionSink
// =============================================================================

/// Sink that gathers all batches into a [`ColumnDataCollection`].
pub struct CollectionSink {
    buffer_manager: Arc<BufferManager>,
    types: Vec<LogicalType>,
}

impl CollectionSink {
    /// Creates a sink collecting rows of the given types.
    #[must_use]
    pub fn new(buffer_manager: Arc<BufferManager>, types: Vec<LogicalType>) -> Self {
        Self {
            buffer_manager,
            types,
        }
    }
}

/// Global state of a [`CollectionSink`].
pub struct CollectionSinkState {
    collection: Mutex<ColumnDataCollection>,
}

impl CollectionSinkState {
    /// Takes the collected rows out of the sink.
    #[must_use]
    pub fn take_collection(&self) -> ColumnDataCollection {
        let mut guard = self.collection.lock();
        let types = guard.types().to_vec();
        let manager = Arc::clone(guard.buffer_manager());
        std::mem::replace(&mut *guard, ColumnDataCollection::new(manager, types))
    }

    /// Rows collected so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.collection.lock().count()
    }
}

impl GlobalSinkState for CollectionSinkState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct CollectionSinkLocalState {
    collection: ColumnDataCollection,
    append_state: ColumnDataAppendState,
}

impl LocalSinkState for CollectionSinkLocalState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl SinkOperator for CollectionSink {
    fn name(&self) -> &'static str {
        "collection_sink"
    }

    fn global_sink_state(&self) -> Arc<dyn GlobalSinkState> {
        Arc::new(CollectionSinkState {
            collection: Mutex::new(ColumnDataCollection::new(
                Arc::clone(&self.buffer_manager),
                self.types.clone(),
            )),
        })
    }

    fn local_sink_state(&self) -> Box<dyn LocalSinkState> {
        let collection =
            ColumnDataCollection::new(Arc::clone(&self.buffer_manager), self.types.clone());
        let mut append_state = ColumnDataAppendState::default();
        collection.initialize_append(&mut append_state);
        Box::new(CollectionSinkLocalState {
            collection,
            append_state,
        })
    }

    fn sink(
        &self,
        _context: &ClientContext,
        _global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
        chunk: &DataChunk,
    ) -> ExecResult<SinkResult> {
        let local = local
            .as_any_mut()
            .downcast_mut::<CollectionSinkLocalState>()
            .ok_or_else(|| ExecError::internal("collection sink got foreign local state"))?;
        local.collection.append(&mut local.append_state, chunk)?;
        Ok(SinkResult::NeedMoreInput)
    }

    fn combine(
        &self,
        _context: &ClientContext,
        global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
    ) -> ExecResult<()> {
        let global = global
            .as_any()
            .downcast_ref::<CollectionSinkState>()
            .ok_or_else(|| ExecError::internal("collection sink got foreign global state"))?;
        let local = local
            .as_any_mut()
            .downcast_mut::<CollectionSinkLocalState>()
            .ok_or_else(|| ExecError::internal("collection sink got foreign local state"))?;
        global.collection.lock().combine(&mut local.collection)?;
        Ok(())
    }

    fn sink_order_matters(&self) -> bool {
        false
    }
}

// =============================================================================
// CountingSink
// =============================================================================

/// Sink that counts rows and records the size of every batch it receives.
pub struct CountingSink;

/// Global state of a [`CountingSink`].
#[derive(Default)]
pub struct CountingSinkState {
    total: AtomicU64,
    batch_sizes: Mutex<Vec<usize>>,
}

impl CountingSinkState {
    /// Total rows observed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Sizes of the batches observed, in arrival order per executor.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

impl GlobalSinkState for CountingSinkState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
struct CountingSinkLocalState {
    rows: u64,
    batch_sizes: Vec<usize>,
}

impl LocalSinkState for CountingSinkLocalState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl SinkOperator for CountingSink {
    fn name(&self) -> &'static str {
        "counting_sink"
    }

    fn global_sink_state(&self) -> Arc<dyn GlobalSinkState> {
        Arc::new(CountingSinkState::default())
    }

    fn local_sink_state(&self) -> Box<dyn LocalSinkState> {
        Box::<CountingSinkLocalState>::default()
    }

    fn sink(
        &self,
        _context: &ClientContext,
        _global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
        chunk: &DataChunk,
    ) -> ExecResult<SinkResult> {
        let local = local
            .as_any_mut()
            .downcast_mut::<CountingSinkLocalState>()
            .ok_or_else(|| ExecError::internal("counting sink got foreign local state"))?;
        local.rows += chunk.len() as u64;
        local.batch_sizes.push(chunk.len());
        Ok(SinkResult::NeedMoreInput)
    }

    fn combine(
        &self,
        _context: &ClientContext,
        global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
    ) -> ExecResult<()> {
        let global = global
            .as_any()
            .downcast_ref::<CountingSinkState>()
            .ok_or_else(|| ExecError::internal("counting sink got foreign global state"))?;
        let local = local
            .as_any_mut()
            .downcast_mut::<CountingSinkLocalState>()
            .ok_or_else(|| ExecError::internal("counting sink got foreign local state"))?;
        global.total.fetch_add(local.rows, Ordering::AcqRel);
        global
            .batch_sizes
            .lock()
            .extend(std::mem::take(&mut local.batch_sizes));
        Ok(())
    }

    fn sink_order_matters(&self) -> bool {
        false
    }
}
