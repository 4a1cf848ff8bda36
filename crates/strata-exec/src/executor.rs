//! The pipeline executor.
//!
//! One executor instance drives one pipeline on one thread. It owns all
//! per-thread mutable state: the local source/sink states, one
//! intermediate chunk per operator (chunk `i` carries the input of
//! operator `i`, i.e. the output of operator `i-1` or the source), the
//! per-operator compaction caches, and the stack of in-process operators
//! that still have output pending for their current input.
//!
//! The cache exists because highly selective operators leave output
//! batches nearly empty, starving downstream vectorized kernels. When a
//! wide input produces a narrow output, the output is parked in the
//! operator's cache instead of being forwarded; once the cache approaches
//! full vector width it is handed downstream as one wide batch. Caching is
//! only installed in front of order-agnostic sinks.

use std::sync::Arc;

use tracing::debug;

use strata_column::DataChunk;
use strata_common::constants::{CACHE_THRESHOLD, VECTOR_SIZE};
use strata_common::types::LogicalType;

use crate::context::ClientContext;
use crate::error::{ExecError, ExecResult};
use crate::operator::{
    LocalSinkState, LocalSourceState, OperatorResult, OperatorState, PhysicalOperator, SinkResult,
};
use crate::pipeline::Pipeline;
use crate::profiler::OperatorProfiler;

/// Compaction is pointless below this vector width.
const CACHING_ENABLED: bool = VECTOR_SIZE >= 128;

/// Drives a pipeline in push mode (sink present) or pull mode (caller
/// receives chunks). Strictly thread-affine.
pub struct PipelineExecutor {
    pipeline: Arc<Pipeline>,
    context: ClientContext,
    profiler: OperatorProfiler,
    local_source_state: Box<dyn LocalSourceState>,
    local_sink_state: Option<Box<dyn LocalSinkState>>,
    /// Chunk `i` holds the input of operator `i`.
    intermediate_chunks: Vec<DataChunk>,
    intermediate_states: Vec<Box<dyn OperatorState>>,
    /// Compaction cache per operator; `None` where caching is disabled.
    cached_chunks: Vec<Option<DataChunk>>,
    /// Operator positions that still have output pending, innermost last.
    in_process_operators: Vec<usize>,
    /// Output of the last operator in push mode.
    final_chunk: DataChunk,
    finished_processing: bool,
    finalized: bool,
}

impl PipelineExecutor {
    /// Creates an executor for `pipeline` bound to `context`.
    #[must_use]
    pub fn new(context: ClientContext, pipeline: Arc<Pipeline>) -> Self {
        let local_source_state = pipeline
            .source
            .local_source_state(pipeline.source_state.as_ref());
        let local_sink_state = pipeline.sink.as_ref().map(|sink| sink.local_sink_state());

        let operator_count = pipeline.operators.len();
        let mut intermediate_chunks = Vec::with_capacity(operator_count);
        let mut intermediate_states = Vec::with_capacity(operator_count);
        let mut cached_chunks = Vec::with_capacity(operator_count);
        for (i, operator) in pipeline.operators.iter().enumerate() {
            let prev_types = if i == 0 {
                pipeline.source.types()
            } else {
                pipeline.operators[i - 1].types()
            };
            intermediate_chunks.push(DataChunk::from_types(prev_types));
            intermediate_states.push(operator.operator_state());

            let cacheable = CACHING_ENABLED
                && pipeline
                    .sink
                    .as_ref()
                    .is_some_and(|sink| !sink.sink_order_matters())
                && operator.requires_cache()
                && operator.types().iter().all(Self::can_cache_type);
            cached_chunks.push(cacheable.then(|| DataChunk::from_types(operator.types())));
        }

        let final_chunk = DataChunk::from_types(&pipeline.output_types());
        Self {
            pipeline,
            context,
            profiler: OperatorProfiler::default(),
            local_source_state,
            local_sink_state,
            intermediate_chunks,
            intermediate_states,
            cached_chunks,
            in_process_operators: Vec::new(),
            final_chunk,
            finished_processing: false,
            finalized: false,
        }
    }

    /// Returns the execution context.
    #[must_use]
    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Returns the per-operator profile.
    #[must_use]
    pub fn profiler(&self) -> &OperatorProfiler {
        &self.profiler
    }

    /// A type can be compacted if row-wise copying never rewrites nested
    /// variable-length layouts: scalars and structs of cacheable types
    /// qualify, lists and maps do not.
    #[must_use]
    pub fn can_cache_type(ty: &LogicalType) -> bool {
        match ty {
            LogicalType::List(_) | LogicalType::Map { .. } => false,
            LogicalType::Struct(children) => {
                children.iter().all(|(_, child)| Self::can_cache_type(child))
            }
            _ => true,
        }
    }

    // -------------------------------------------------------------------------
    // Push mode
    // -------------------------------------------------------------------------

    /// Runs the pipeline source to exhaustion, pushing every batch through
    /// the operators into the sink, then finalizes.
    pub fn execute(&mut self) -> ExecResult<()> {
        if self.pipeline.sink.is_none() {
            return Err(ExecError::internal("execute() requires a sink"));
        }
        let has_operators = !self.pipeline.operators.is_empty();
        loop {
            // The source lands in operator 0's input chunk, or directly in
            // the final chunk when there are no operators. Take it out so
            // the push below can borrow the executor freely.
            let mut source_chunk = if has_operators {
                std::mem::take(&mut self.intermediate_chunks[0])
            } else {
                std::mem::take(&mut self.final_chunk)
            };
            let fetched = self.fetch_from_source(&mut source_chunk);
            let rows = source_chunk.len();
            let pushed = match &fetched {
                Ok(()) if rows > 0 => Some(self.execute_push_internal(&source_chunk, 0)),
                _ => None,
            };
            if has_operators {
                self.intermediate_chunks[0] = source_chunk;
            } else {
                self.final_chunk = source_chunk;
            }
            fetched?;
            match pushed {
                None => break,
                Some(Err(err)) => return Err(err),
                Some(Ok(OperatorResult::Finished)) => {
                    self.finished_processing = true;
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
        self.push_finalize()
    }

    /// Pushes one externally-produced batch through the pipeline.
    pub fn execute_push(&mut self, input: &DataChunk) -> ExecResult<OperatorResult> {
        let result = self.execute_push_internal(input, 0)?;
        if result == OperatorResult::Finished {
            self.finished_processing = true;
        }
        Ok(result)
    }

    fn execute_push_internal(
        &mut self,
        input: &DataChunk,
        initial_idx: usize,
    ) -> ExecResult<OperatorResult> {
        let Some(sink) = self.pipeline.sink.clone() else {
            return Err(ExecError::internal("push execution requires a sink"));
        };
        let Some(sink_state) = self.pipeline.sink_state.clone() else {
            return Err(ExecError::internal("pipeline sink has no global state"));
        };
        if input.is_empty() {
            return Ok(OperatorResult::NeedMoreInput);
        }
        let has_operators = !self.pipeline.operators.is_empty();
        loop {
            let result = if has_operators {
                let mut final_chunk = std::mem::take(&mut self.final_chunk);
                let run = self.execute_operators(input, &mut final_chunk, initial_idx);
                self.final_chunk = final_chunk;
                match run? {
                    OperatorResult::Finished => return Ok(OperatorResult::Finished),
                    other => other,
                }
            } else {
                OperatorResult::NeedMoreInput
            };

            let sink_chunk = if has_operators { &self.final_chunk } else { input };
            if !sink_chunk.is_empty() {
                let span = self.profiler.begin_span(&self.context, sink.name())?;
                let local = self
                    .local_sink_state
                    .as_deref_mut()
                    .ok_or_else(|| ExecError::internal("local sink state missing"))?;
                let sink_result =
                    sink.sink(&self.context, sink_state.as_ref(), local, sink_chunk)?;
                self.profiler.end_span(span, None)?;
                if sink_result == SinkResult::Finished {
                    return Ok(OperatorResult::Finished);
                }
            }
            if result == OperatorResult::NeedMoreInput {
                return Ok(OperatorResult::NeedMoreInput);
            }
        }
    }

    /// Flushes the compaction caches (in forward operator order) and merges
    /// the thread-local sink state into the global sink. Callable exactly
    /// once.
    pub fn push_finalize(&mut self) -> ExecResult<()> {
        if self.finalized {
            return Err(ExecError::internal(
                "push_finalize called on a pipeline that was already finalized",
            ));
        }
        self.finalized = true;

        if self.finished_processing {
            // An early Finished discards pending caches.
            for cache in &mut self.cached_chunks {
                cache.take();
            }
        } else {
            debug_assert!(self.in_process_operators.is_empty());
            for i in 0..self.cached_chunks.len() {
                let Some(cache) = self.cached_chunks[i].take() else {
                    continue;
                };
                if !cache.is_empty() {
                    debug!(operator = i, rows = cache.len(), "flushing operator cache");
                    self.execute_push_internal(&cache, i + 1)?;
                }
            }
        }

        let Some(sink) = self.pipeline.sink.clone() else {
            return Err(ExecError::internal("push_finalize requires a sink"));
        };
        let Some(sink_state) = self.pipeline.sink_state.clone() else {
            return Err(ExecError::internal("pipeline sink has no global state"));
        };
        let mut local = self
            .local_sink_state
            .take()
            .ok_or_else(|| ExecError::internal("local sink state missing"))?;
        sink.combine(&self.context, sink_state.as_ref(), local.as_mut())?;
        self.profiler.flush();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pull mode
    // -------------------------------------------------------------------------

    /// Produces the next output batch into `result`; an empty result
    /// signals exhaustion. If any worker on the shared context recorded a
    /// failure, that failure is surfaced instead of a local one.
    pub fn execute_pull(&mut self, result: &mut DataChunk) -> ExecResult<()> {
        debug_assert!(self.pipeline.sink.is_none());
        match self.execute_pull_internal(result) {
            Ok(()) => Ok(()),
            Err(err) => {
                // The first failure on the shared context wins.
                if let Some(stored) = self.context.take_error() {
                    return Err(stored);
                }
                Err(err)
            }
        }
    }

    fn execute_pull_internal(&mut self, result: &mut DataChunk) -> ExecResult<()> {
        let has_operators = !self.pipeline.operators.is_empty();
        while result.is_empty() {
            if !has_operators {
                self.fetch_from_source(result)?;
                break;
            }
            if self.in_process_operators.is_empty() {
                let mut source_chunk = std::mem::take(&mut self.intermediate_chunks[0]);
                let fetched = self.fetch_from_source(&mut source_chunk);
                let rows = source_chunk.len();
                self.intermediate_chunks[0] = source_chunk;
                fetched?;
                if rows == 0 {
                    break;
                }
            }
            let source_chunk = std::mem::take(&mut self.intermediate_chunks[0]);
            let run = self.execute_operators(&source_chunk, result, 0);
            self.intermediate_chunks[0] = source_chunk;
            run?;
        }
        Ok(())
    }

    /// Ends a pull-mode execution. Pull mode caches nothing, so there is
    /// nothing to flush. Callable exactly once.
    pub fn pull_finalize(&mut self) -> ExecResult<()> {
        if self.finalized {
            return Err(ExecError::internal(
                "pull_finalize called on a pipeline that was already finalized",
            ));
        }
        self.finalized = true;
        self.profiler.flush();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // The operator state machine
    // -------------------------------------------------------------------------

    /// Resumes at the innermost in-process operator, or at the re-entry
    /// point if none is pending.
    fn go_to_source(&mut self, initial_idx: usize) -> usize {
        match self.in_process_operators.pop() {
            Some(idx) => {
                debug_assert!(idx >= initial_idx);
                idx
            }
            None => initial_idx,
        }
    }

    /// Threads `input` through the operator chain starting after
    /// `initial_idx`, writing the pipeline output into `result`.
    ///
    /// `initial_idx` is 0 for source batches; a flushed cache of operator
    /// `i` re-enters with `initial_idx = i + 1` so it only traverses the
    /// operators downstream of its producer.
    fn execute_operators(
        &mut self,
        input: &DataChunk,
        result: &mut DataChunk,
        initial_idx: usize,
    ) -> ExecResult<OperatorResult> {
        if input.is_empty() {
            return Ok(OperatorResult::NeedMoreInput);
        }
        let operator_count = self.pipeline.operators.len();
        debug_assert!(operator_count > 0);

        let mut current_idx = self.go_to_source(initial_idx);
        if current_idx == initial_idx {
            // A fresh input batch enters just after the re-entry point.
            current_idx += 1;
        }
        if current_idx > operator_count {
            // Re-entry past the last operator: the input is the output.
            result.reference(input);
            return Ok(OperatorResult::NeedMoreInput);
        }

        loop {
            if current_idx == initial_idx {
                // Walked back to the re-entry point: need a fresh batch.
                return Ok(OperatorResult::NeedMoreInput);
            }
            let operator_idx = current_idx - 1;
            let operator = Arc::clone(&self.pipeline.operators[operator_idx]);

            let span = self.profiler.begin_span(&self.context, operator.name())?;
            let current_len = {
                let (upstream, downstream) = self.intermediate_chunks.split_at_mut(current_idx);
                let prev_chunk: &DataChunk = if current_idx == initial_idx + 1 {
                    input
                } else {
                    &upstream[current_idx - 1]
                };
                let current_chunk: &mut DataChunk = if current_idx < operator_count {
                    &mut downstream[0]
                } else {
                    &mut *result
                };
                current_chunk.reset();
                let prev_len = prev_chunk.len();

                let op_result = operator.execute(
                    &self.context,
                    prev_chunk,
                    current_chunk,
                    self.intermediate_states[operator_idx].as_mut(),
                )?;
                self.profiler.end_span(span, Some(current_chunk))?;

                match op_result {
                    OperatorResult::HaveMoreOutput => {
                        // This operator must be re-entered against the same
                        // input before anything upstream runs again.
                        self.in_process_operators.push(current_idx);
                    }
                    OperatorResult::Finished => {
                        debug_assert!(current_chunk.is_empty());
                        return Ok(OperatorResult::Finished);
                    }
                    OperatorResult::NeedMoreInput => {}
                }
                Self::cache_chunk(
                    &mut self.cached_chunks[operator_idx],
                    prev_len,
                    current_chunk,
                    operator.as_ref(),
                )?;
                current_chunk.len()
            };

            if current_len == 0 {
                // No (forwarded) output; pull more data from upstream.
                current_idx = self.go_to_source(initial_idx);
                continue;
            }
            current_idx += 1;
            if current_idx > operator_count {
                break;
            }
        }
        Ok(if self.in_process_operators.is_empty() {
            OperatorResult::NeedMoreInput
        } else {
            OperatorResult::HaveMoreOutput
        })
    }

    /// Parks a narrow output produced from a wide input in the operator's
    /// cache. A cached-but-unflushed batch makes the operator look like it
    /// produced nothing this turn; a cache near full vector width is moved
    /// out wholesale as the operator's output.
    fn cache_chunk(
        cache: &mut Option<DataChunk>,
        prev_len: usize,
        current_chunk: &mut DataChunk,
        operator: &dyn PhysicalOperator,
    ) -> ExecResult<()> {
        if !CACHING_ENABLED {
            return Ok(());
        }
        let Some(cache_chunk) = cache else {
            return Ok(());
        };
        if prev_len >= CACHE_THRESHOLD && current_chunk.len() < CACHE_THRESHOLD {
            cache_chunk.append(&*current_chunk)?;
            if cache_chunk.len() >= VECTOR_SIZE - CACHE_THRESHOLD {
                current_chunk.move_from(cache_chunk);
                cache_chunk.initialize(operator.types());
            } else {
                current_chunk.reset();
            }
        }
        Ok(())
    }

    /// Fetches the next source batch into `chunk` inside a profile span.
    fn fetch_from_source(&mut self, chunk: &mut DataChunk) -> ExecResult<()> {
        let source = Arc::clone(&self.pipeline.source);
        let span = self.profiler.begin_span(&self.context, source.name())?;
        chunk.reset();
        source.get_data(
            &self.context,
            chunk,
            self.pipeline.source_state.as_ref(),
            self.local_source_state.as_mut(),
        )?;
        self.profiler.end_span(span, Some(chunk))?;
        Ok(())
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("pipeline", &self.pipeline)
            .field("in_process_operators", &self.in_process_operators)
            .field("finished_processing", &self.finished_processing)
            .field("finalized", &self.finalized)
            .finish()
    }
}
