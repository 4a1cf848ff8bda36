//! Operator capability traits.
//!
//! A pipeline is built from three capabilities: a source that produces row
//! batches, intermediate operators that transform them, and an optional
//! sink that consumes them. Global states are shared across the executors
//! of one pipeline and synchronize internally; local states are owned by a
//! single executor and need no locking.

use std::any::Any;

use strata_column::DataChunk;
use strata_common::types::LogicalType;

use crate::context::ClientContext;
use crate::error::ExecResult;

/// Result of one intermediate-operator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorResult {
    /// The operator consumed its input; feed it the next batch.
    NeedMoreInput,
    /// The operator has more output for the same input; re-invoke it with
    /// the same input batch.
    HaveMoreOutput,
    /// The operator is done for good; the pipeline can stop early.
    Finished,
}

/// Result of one sink invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkResult {
    /// The sink accepted the batch; keep pushing.
    NeedMoreInput,
    /// The sink needs no further input; the pipeline can stop early.
    Finished,
}

/// Per-executor state of one intermediate operator.
pub trait OperatorState: Send {
    /// Downcasting access for the owning operator.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-executor state of a source.
pub trait LocalSourceState: Send {
    /// Downcasting access for the owning source.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// State shared by all executors reading one source.
pub trait GlobalSourceState: Send + Sync {
    /// Downcasting access for the owning source.
    fn as_any(&self) -> &dyn Any;
}

/// Per-executor state of a sink.
pub trait LocalSinkState: Send {
    /// Downcasting access for the owning sink.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// State shared by all executors feeding one sink. Implementations
/// synchronize internally.
pub trait GlobalSinkState: Send + Sync {
    /// Downcasting access for the owning sink.
    fn as_any(&self) -> &dyn Any;
}

/// Stateless placeholder for operators that keep no per-executor state.
#[derive(Debug, Default)]
pub struct EmptyState;

impl OperatorState for EmptyState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl LocalSourceState for EmptyState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl LocalSinkState for EmptyState {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl GlobalSourceState for EmptyState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl GlobalSinkState for EmptyState {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A pipeline source: produces row batches until exhausted.
pub trait SourceOperator: Send + Sync {
    /// Operator name, used in profiles and error messages.
    fn name(&self) -> &'static str;

    /// Types of the produced batches.
    fn types(&self) -> &[LogicalType];

    /// Creates the state shared by every executor of this pipeline.
    fn global_source_state(&self) -> std::sync::Arc<dyn GlobalSourceState>;

    /// Creates one executor's private state.
    fn local_source_state(&self, global: &dyn GlobalSourceState) -> Box<dyn LocalSourceState>;

    /// Produces the next batch into `chunk`; an empty chunk signals
    /// exhaustion.
    fn get_data(
        &self,
        context: &ClientContext,
        chunk: &mut DataChunk,
        global: &dyn GlobalSourceState,
        local: &mut dyn LocalSourceState,
    ) -> ExecResult<()>;
}

/// An intermediate pipeline operator: transforms batches.
pub trait PhysicalOperator: Send + Sync {
    /// Operator name, used in profiles and error messages.
    fn name(&self) -> &'static str;

    /// Types of the produced batches.
    fn types(&self) -> &[LogicalType];

    /// Creates one executor's private state.
    fn operator_state(&self) -> Box<dyn OperatorState>;

    /// Transforms `input` into `output`. The executor resets `output`
    /// before every invocation.
    fn execute(
        &self,
        context: &ClientContext,
        input: &DataChunk,
        output: &mut DataChunk,
        state: &mut dyn OperatorState,
    ) -> ExecResult<OperatorResult>;

    /// Whether highly selective output should be compacted back toward
    /// full vector width before being forwarded downstream.
    fn requires_cache(&self) -> bool {
        false
    }
}

/// A pipeline terminal that consumes batches into shared state.
pub trait SinkOperator: Send + Sync {
    /// Operator name, used in profiles and error messages.
    fn name(&self) -> &'static str;

    /// Creates the state shared by every executor of this pipeline.
    fn global_sink_state(&self) -> std::sync::Arc<dyn GlobalSinkState>;

    /// Creates one executor's private state.
    fn local_sink_state(&self) -> Box<dyn LocalSinkState>;

    /// Consumes one batch.
    fn sink(
        &self,
        context: &ClientContext,
        global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
        chunk: &DataChunk,
    ) -> ExecResult<SinkResult>;

    /// Merges one executor's local state into the global state. Must be
    /// safe to call from multiple executors; called exactly once per
    /// executor, at finalize.
    fn combine(
        &self,
        context: &ClientContext,
        global: &dyn GlobalSinkState,
        local: &mut dyn LocalSinkState,
    ) -> ExecResult<()>;

    /// Whether the sink requires input in source order. Order-agnostic
    /// sinks enable output compaction in front of them.
    fn sink_order_matters(&self) -> bool {
        true
    }
}
