//! Per-operator profiling.
//!
//! Every operator invocation runs inside a span: entering the span is the
//! cancellation point (an interrupted context raises [`ExecError::Interrupted`]
//! there), and closing it records timing, verifies the output chunk and
//! accumulates row counts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use strata_column::DataChunk;

use crate::context::ClientContext;
use crate::error::{ExecError, ExecResult};

/// Accumulated metrics of one operator.
#[derive(Debug, Default, Clone)]
pub struct OperatorMetrics {
    /// Number of invocations.
    pub invocations: u64,
    /// Rows produced across all invocations.
    pub rows: u64,
    /// Wall time spent inside the operator.
    pub elapsed: Duration,
}

/// An open operator span.
#[derive(Debug)]
#[must_use = "a span must be closed through OperatorProfiler::end_span"]
pub struct OperatorSpan {
    name: &'static str,
    start: Instant,
}

/// Thread-affine per-operator profiler.
#[derive(Debug, Default)]
pub struct OperatorProfiler {
    metrics: HashMap<&'static str, OperatorMetrics>,
}

impl OperatorProfiler {
    /// Opens a span around one operator invocation.
    ///
    /// This is the executor's cancellation point: an interrupted context
    /// fails span entry.
    pub fn begin_span(
        &self,
        context: &ClientContext,
        name: &'static str,
    ) -> ExecResult<OperatorSpan> {
        if context.is_interrupted() {
            return Err(ExecError::Interrupted);
        }
        trace!(operator = name, "operator span enter");
        Ok(OperatorSpan {
            name,
            start: Instant::now(),
        })
    }

    /// Closes a span, verifying the output chunk if one was produced.
    pub fn end_span(&mut self, span: OperatorSpan, output: Option<&DataChunk>) -> ExecResult<()> {
        if let Some(chunk) = output {
            chunk.verify()?;
        }
        let metrics = self.metrics.entry(span.name).or_default();
        metrics.invocations += 1;
        metrics.elapsed += span.start.elapsed();
        metrics.rows += output.map(DataChunk::len).unwrap_or(0) as u64;
        Ok(())
    }

    /// Returns the metrics recorded for one operator.
    #[must_use]
    pub fn metrics(&self, name: &str) -> Option<&OperatorMetrics> {
        self.metrics.get(name)
    }

    /// Logs a summary of all recorded metrics.
    pub fn flush(&self) {
        for (name, metrics) in &self.metrics {
            debug!(
                operator = name,
                invocations = metrics.invocations,
                rows = metrics.rows,
                elapsed_us = metrics.elapsed.as_micros() as u64,
                "operator profile"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_common::types::{LogicalType, Value};

    #[test]
    fn test_span_records_metrics() {
        let mut profiler = OperatorProfiler::default();
        let context = ClientContext::new();

        let mut chunk = DataChunk::from_types(&[LogicalType::Int32]);
        chunk.append_row(&[Value::Int32(1)]).unwrap();
        chunk.append_row(&[Value::Int32(2)]).unwrap();

        for _ in 0..3 {
            let span = profiler.begin_span(&context, "scan").unwrap();
            profiler.end_span(span, Some(&chunk)).unwrap();
        }

        let metrics = profiler.metrics("scan").unwrap();
        assert_eq!(metrics.invocations, 3);
        assert_eq!(metrics.rows, 6);
    }

    #[test]
    fn test_interrupt_raises_at_span_entry() {
        let profiler = OperatorProfiler::default();
        let context = ClientContext::new();
        context.interrupt();

        let err = profiler.begin_span(&context, "scan").unwrap_err();
        assert!(matches!(err, ExecError::Interrupted));
    }
}
