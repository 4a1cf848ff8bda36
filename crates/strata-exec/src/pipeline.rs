//! Pipeline description.
//!
//! A [`Pipeline`] is immutable once built and shared between the executors
//! that drive it: one source, an ordered chain of intermediate operators,
//! and an optional sink, together with the global source/sink states.

use std::sync::Arc;

use strata_common::types::LogicalType;

use crate::operator::{
    GlobalSinkState, GlobalSourceState, PhysicalOperator, SinkOperator, SourceOperator,
};

/// An immutable description of one unit of query execution.
pub struct Pipeline {
    /// The batch producer.
    pub source: Arc<dyn SourceOperator>,
    /// Intermediate operators, in execution order.
    pub operators: Vec<Arc<dyn PhysicalOperator>>,
    /// The terminal consumer; absent in pull mode.
    pub sink: Option<Arc<dyn SinkOperator>>,
    /// State shared by all executors reading the source.
    pub source_state: Arc<dyn GlobalSourceState>,
    /// State shared by all executors feeding the sink.
    pub sink_state: Option<Arc<dyn GlobalSinkState>>,
}

impl Pipeline {
    /// Creates a pipeline over the given source.
    #[must_use]
    pub fn new(source: Arc<dyn SourceOperator>) -> Self {
        let source_state = source.global_source_state();
        Self {
            source,
            operators: Vec::new(),
            sink: None,
            source_state,
            sink_state: None,
        }
    }

    /// Appends an intermediate operator.
    #[must_use]
    pub fn with_operator(mut self, operator: Arc<dyn PhysicalOperator>) -> Self {
        self.operators.push(operator);
        self
    }

    /// Terminates the pipeline with a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn SinkOperator>) -> Self {
        self.sink_state = Some(sink.global_sink_state());
        self.sink = Some(sink);
        self
    }

    /// Types of the batches leaving the pipeline (last operator, or the
    /// source if there are no operators).
    #[must_use]
    pub fn output_types(&self) -> Vec<LogicalType> {
        self.operators
            .last()
            .map(|op| op.types().to_vec())
            .unwrap_or_else(|| self.source.types().to_vec())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field(
                "operators",
                &self.operators.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .finish()
    }
}
