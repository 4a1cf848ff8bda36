//! # strata-exec
//!
//! The vectorized pipeline executor:
//! - Capability traits for sources, intermediate operators and sinks
//! - [`Pipeline`]: the immutable description shared between executors
//! - [`PipelineExecutor`]: a thread-affine driver pushing row batches from
//!   a source through an operator chain into a sink (push mode) or a
//!   caller-provided chunk (pull mode), with an output-compaction cache
//!   behind selective operators

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Client context: interrupt flag and the executor-global error slot
pub mod context;

/// Error types
pub mod error;

/// The pipeline executor
pub mod executor;

/// Operator capability traits
pub mod operator;

/// Built-in operators used by tests and the table-data plumbing
pub mod operators;

/// Pipeline description
pub mod pipeline;

/// Per-operator profiling
pub mod profiler;

pub use context::ClientContext;
pub use error::{ExecError, ExecResult};
pub use executor::PipelineExecutor;
pub use operator::{
    GlobalSinkState, GlobalSourceState, LocalSinkState, LocalSourceState, OperatorResult,
    OperatorState, PhysicalOperator, SinkOperator, SinkResult, SourceOperator,
};
pub use pipeline::Pipeline;
