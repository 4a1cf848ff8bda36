//! Row-predicate filter.

use std::sync::Arc;

use strata_column::DataChunk;
use strata_common::types::{LogicalType, Value};

use crate::context::ClientContext;
use crate::error::{ExecError, ExecResult};
use crate::operator::{EmptyState, OperatorResult, OperatorState, PhysicalOperator};

/// Predicate deciding whether row `row` of `chunk` survives the filter.
pub type FilterPredicate = Arc<dyn Fn(&DataChunk, usize) -> bool + Send + Sync>;

/// Filter that keeps the rows matching a predicate.
///
/// Filters are the textbook case for output compaction: a selective
/// predicate turns full input batches into nearly-empty output batches,
/// so `requires_cache` is set.
pub struct VectorFilter {
    types: Vec<LogicalType>,
    predicate: FilterPredicate,
}

impl VectorFilter {
    /// Creates a filter over rows of the given types.
    #[must_use]
    pub fn new(types: Vec<LogicalType>, predicate: FilterPredicate) -> Self {
        Self { types, predicate }
    }
}

impl PhysicalOperator for VectorFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn types(&self) -> &[LogicalType] {
        &self.types
    }

    fn operator_state(&self) -> Box<dyn OperatorState> {
        Box::new(EmptyState)
    }

    fn execute(
        &self,
        _context: &ClientContext,
        input: &DataChunk,
        output: &mut DataChunk,
        _state: &mut dyn OperatorState,
    ) -> ExecResult<OperatorResult> {
        if output.column_count() != input.column_count() {
            return Err(ExecError::operator(
                self.name(),
                "output chunk schema does not match input",
            ));
        }
        for row in 0..input.len() {
            if (self.predicate)(input, row) {
                let values: Vec<Value> = (0..input.column_count())
                    .map(|col| input.value(col, row).clone())
                    .collect();
                output.append_row(&values)?;
            }
        }
        Ok(OperatorResult::NeedMoreInput)
    }

    fn requires_cache(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_matching_rows() {
        let types = vec![LogicalType::Int32];
        let filter = VectorFilter::new(
            types.clone(),
            Arc::new(|chunk, row| matches!(chunk.value(0, row), Value::Int32(v) if v % 2 == 0)),
        );

        let mut input = DataChunk::from_types(&types);
        for i in 0..10 {
            input.append_row(&[Value::Int32(i)]).unwrap();
        }
        let mut output = DataChunk::from_types(&types);
        let mut state = filter.operator_state();
        let result = filter
            .execute(&ClientContext::new(), &input, &mut output, state.as_mut())
            .unwrap();

        assert_eq!(result, OperatorResult::NeedMoreInput);
        assert_eq!(output.len(), 5);
        assert_eq!(output.value(0, 1), &Value::Int32(2));
    }
}
