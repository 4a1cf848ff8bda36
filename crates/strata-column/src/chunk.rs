//! Row batches.
//!
//! A [`DataChunk`] is the unit of data flowing through the engine: up to
//! `VECTOR_SIZE` rows across N columns. Each column is a [`Vector`] whose
//! storage is shared behind an `Arc`, making [`DataChunk::reference`] an
//! O(1) operation and mutation copy-on-write.

use std::fmt;
use std::sync::Arc;

use strata_common::constants::VECTOR_SIZE;
use strata_common::types::{LogicalType, Value};

use crate::error::{ColumnError, ColumnResult};

/// One column of a chunk.
#[derive(Debug, Clone)]
pub struct Vector {
    ty: LogicalType,
    values: Arc<Vec<Value>>,
}

impl Vector {
    /// Creates an empty vector of the given type.
    #[must_use]
    pub fn new(ty: LogicalType) -> Self {
        Self {
            ty,
            values: Arc::new(Vec::with_capacity(VECTOR_SIZE)),
        }
    }

    /// Returns the vector's logical type.
    #[must_use]
    pub fn ty(&self) -> &LogicalType {
        &self.ty
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the vector holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `row`.
    #[must_use]
    pub fn value(&self, row: usize) -> &Value {
        &self.values[row]
    }

    /// Returns all values as a slice.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Appends a value. The value must conform to the vector type.
    pub fn push(&mut self, value: Value) -> ColumnResult<()> {
        if !value.is_of(&self.ty) {
            return Err(ColumnError::TypeMismatch {
                expected: self.ty.clone(),
                value: value.to_string(),
            });
        }
        Arc::make_mut(&mut self.values).push(value);
        Ok(())
    }

    /// Extends this vector with all values of `other`.
    fn extend_from(&mut self, other: &Vector) {
        Arc::make_mut(&mut self.values).extend_from_slice(&other.values);
    }

    /// Replaces the stored values wholesale. Used by the decode path, which
    /// produces conforming values by construction.
    pub(crate) fn load(&mut self, values: Vec<Value>) {
        self.values = Arc::new(values);
    }

    /// Shares the storage of `other` read-only.
    fn reference(&mut self, other: &Vector) {
        self.ty = other.ty.clone();
        self.values = Arc::clone(&other.values);
    }

    fn clear(&mut self) {
        if let Some(values) = Arc::get_mut(&mut self.values) {
            values.clear();
        } else {
            // Storage is shared; detach instead of copying values we are
            // about to discard.
            self.values = Arc::new(Vec::with_capacity(VECTOR_SIZE));
        }
    }

    /// Checks that every value conforms to the vector type.
    pub fn verify(&self) -> ColumnResult<()> {
        for value in self.values.iter() {
            if !value.is_of(&self.ty) {
                return Err(ColumnError::TypeMismatch {
                    expected: self.ty.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A row-aligned bundle of column vectors.
#[derive(Debug, Clone, Default)]
pub struct DataChunk {
    vectors: Vec<Vector>,
    count: usize,
}

impl DataChunk {
    /// Creates a chunk with vectors of the given types.
    #[must_use]
    pub fn from_types(types: &[LogicalType]) -> Self {
        let mut chunk = Self::default();
        chunk.initialize(types);
        chunk
    }

    /// Allocates vectors of the given types; any existing data is dropped.
    pub fn initialize(&mut self, types: &[LogicalType]) {
        self.vectors = types.iter().cloned().map(Vector::new).collect();
        self.count = 0;
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the chunk holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.vectors.len()
    }

    /// Returns the column types.
    #[must_use]
    pub fn types(&self) -> Vec<LogicalType> {
        self.vectors.iter().map(|v| v.ty().clone()).collect()
    }

    /// Returns the vector for column `col`.
    #[must_use]
    pub fn column(&self, col: usize) -> &Vector {
        &self.vectors[col]
    }

    /// Returns the value at (`col`, `row`).
    #[must_use]
    pub fn value(&self, col: usize, row: usize) -> &Value {
        self.vectors[col].value(row)
    }

    /// Clears all rows; vector storage is retained.
    pub fn reset(&mut self) {
        for vector in &mut self.vectors {
            vector.clear();
        }
        self.count = 0;
    }

    /// Appends one row of values.
    pub fn append_row(&mut self, row: &[Value]) -> ColumnResult<()> {
        if row.len() != self.vectors.len() {
            return Err(ColumnError::ColumnCountMismatch {
                expected: self.vectors.len(),
                actual: row.len(),
            });
        }
        if self.count + 1 > VECTOR_SIZE {
            return Err(ColumnError::CapacityExceeded {
                rows: self.count + 1,
                capacity: VECTOR_SIZE,
            });
        }
        for (vector, value) in self.vectors.iter_mut().zip(row.iter()) {
            vector.push(value.clone())?;
        }
        self.count += 1;
        Ok(())
    }

    /// Appends all rows of `other`. Schemas must match and the combined
    /// row count must stay within the vector width.
    pub fn append(&mut self, other: &DataChunk) -> ColumnResult<()> {
        self.check_schema(other)?;
        if self.count + other.count > VECTOR_SIZE {
            return Err(ColumnError::CapacityExceeded {
                rows: self.count + other.count,
                capacity: VECTOR_SIZE,
            });
        }
        for (vector, other_vector) in self.vectors.iter_mut().zip(other.vectors.iter()) {
            vector.extend_from(other_vector);
        }
        self.count += other.count;
        Ok(())
    }

    /// Steals the storage of `other`, leaving it empty and untyped.
    pub fn move_from(&mut self, other: &mut DataChunk) {
        self.vectors = std::mem::take(&mut other.vectors);
        self.count = other.count;
        other.count = 0;
    }

    /// Shares the storage of `other` read-only.
    pub fn reference(&mut self, other: &DataChunk) {
        if self.vectors.len() != other.vectors.len() {
            self.vectors = other.vectors.clone();
        } else {
            for (vector, other_vector) in self.vectors.iter_mut().zip(other.vectors.iter()) {
                vector.reference(other_vector);
            }
        }
        self.count = other.count;
    }

    /// Replaces one column's values wholesale (decode path).
    pub(crate) fn load_column(&mut self, col: usize, values: Vec<Value>) {
        self.vectors[col].load(values);
    }

    /// Sets the row count after loading columns directly.
    pub(crate) fn set_cardinality(&mut self, count: usize) {
        debug_assert!(self.vectors.iter().all(|v| v.len() == count));
        self.count = count;
    }

    /// Checks the chunk invariants: aligned vector lengths and conforming
    /// values.
    pub fn verify(&self) -> ColumnResult<()> {
        for vector in &self.vectors {
            if vector.len() != self.count {
                return Err(ColumnError::internal(format!(
                    "vector length {} does not match chunk count {}",
                    vector.len(),
                    self.count
                )));
            }
            vector.verify()?;
        }
        Ok(())
    }

    fn check_schema(&self, other: &DataChunk) -> ColumnResult<()> {
        if self.vectors.len() != other.vectors.len() {
            return Err(ColumnError::ColumnCountMismatch {
                expected: self.vectors.len(),
                actual: other.vectors.len(),
            });
        }
        for (column, (a, b)) in self.vectors.iter().zip(other.vectors.iter()).enumerate() {
            if a.ty() != b.ty() {
                return Err(ColumnError::SchemaMismatch {
                    column,
                    expected: a.ty().clone(),
                    actual: b.ty().clone(),
                });
            }
        }
        Ok(())
    }
}

// Rendering is only used by tests and diagnostics; cap the output.
impl fmt::Display for DataChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DataChunk ({} rows x {} cols)",
            self.count,
            self.column_count()
        )?;
        let display_rows = self.count.min(10);
        for row in 0..display_rows {
            for (col, vector) in self.vectors.iter().enumerate() {
                if col > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{}", vector.value(row))?;
            }
            writeln!(f)?;
        }
        if self.count > 10 {
            writeln!(f, "... ({} more rows)", self.count - 10)?;
        }
        Ok(())
    }
}
