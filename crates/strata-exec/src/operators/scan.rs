//! Collection scan source.

use std::any::Any;
use std::sync::Arc;

use strata_column::{ColumnDataCollection, ColumnDataScanState, DataChunk};
use strata_common::types::LogicalType;

use crate::context::ClientContext;
use crate::error::{ExecError, ExecResult};
use crate::operator::{EmptyState, GlobalSourceState, LocalSourceState, SourceOperator};

/// Source that emits the chunks of a [`ColumnDataCollection`] in order.
pub struct CollectionScanSource {
    collection: Arc<ColumnDataCollection>,
    types: Vec<LogicalType>,
}

impl CollectionScanSource {
    /// Creates a scan over the given collection.
    #[must_use]
    pub fn new(collection: Arc<ColumnDataCollection>) -> Self {
        let types = collection.types().to_vec();
        Self { collection, types }
    }
}

struct CollectionScanLocalState {
    scan_state: ColumnDataScanState,
}

impl LocalSourceState for CollectionScanLocalState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl SourceOperator for CollectionScanSource {
    fn name(&self) -> &'static str {
        "collection_scan"
    }

    fn types(&self) -> &[LogicalType] {
        &self.types
    }

    fn global_source_state(&self) -> Arc<dyn GlobalSourceState> {
        Arc::new(EmptyState)
    }

    fn local_source_state(&self, _global: &dyn GlobalSourceState) -> Box<dyn LocalSourceState> {
        let mut scan_state = ColumnDataScanState::default();
        self.collection.initialize_scan(&mut scan_state);
        Box::new(CollectionScanLocalState { scan_state })
    }

    fn get_data(
        &self,
        _context: &ClientContext,
        chunk: &mut DataChunk,
        _global: &dyn GlobalSourceState,
        local: &mut dyn LocalSourceState,
    ) -> ExecResult<()> {
        let local = local
            .as_any_mut()
            .downcast_mut::<CollectionScanLocalState>()
            .ok_or_else(|| ExecError::internal("collection scan got foreign local state"))?;
        self.collection.scan(&mut local.scan_state, chunk)?;
        Ok(())
    }
}
