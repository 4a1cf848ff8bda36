//! Table data serialization.
//!
//! A table's rows are written into the table-data stream chunk by chunk:
//! `u32 chunk_count`, then per chunk a `u16` row count and per column a
//! validity bitmap followed by the non-NULL values in row order. Nested
//! values carry a presence flag per element instead of a bitmap.

use strata_catalog::BoundCreateTableInfo;
use strata_catalog::TableEntry;
use strata_column::{ColumnDataScanState, DataChunk};
use strata_common::types::{LogicalType, Value};
use strata_storage::{MetaBlockReader, MetaBlockWriter};

use crate::error::{CheckpointError, CheckpointResult};

/// Writes one table's rows into the table-data stream.
pub struct TableDataWriter<'a> {
    writer: &'a mut MetaBlockWriter,
}

impl<'a> TableDataWriter<'a> {
    /// Creates a writer appending to the given stream.
    pub fn new(writer: &'a mut MetaBlockWriter) -> Self {
        Self { writer }
    }

    /// Writes the full contents of `table`.
    pub fn write_table_data(&mut self, table: &TableEntry) -> CheckpointResult<()> {
        let data = table.data.read();
        let types = table.types();

        self.writer.write_u32(data.chunk_count() as u32)?;
        let mut state = ColumnDataScanState::default();
        data.initialize_scan(&mut state);
        let mut chunk = DataChunk::default();
        loop {
            data.scan(&mut state, &mut chunk)?;
            if chunk.is_empty() {
                break;
            }
            self.write_chunk(&types, &chunk)?;
        }
        Ok(())
    }

    fn write_chunk(&mut self, types: &[LogicalType], chunk: &DataChunk) -> CheckpointResult<()> {
        self.writer.write_u16(chunk.len() as u16)?;
        for (col, ty) in types.iter().enumerate() {
            self.write_column(ty, chunk, col)?;
        }
        Ok(())
    }

    fn write_column(
        &mut self,
        ty: &LogicalType,
        chunk: &DataChunk,
        col: usize,
    ) -> CheckpointResult<()> {
        let rows = chunk.len();
        let mut validity = vec![0u8; rows.div_ceil(8)];
        for row in 0..rows {
            if !chunk.value(col, row).is_null() {
                validity[row / 8] |= 1 << (row % 8);
            }
        }
        self.writer.write_bytes(&validity)?;
        for row in 0..rows {
            let value = chunk.value(col, row);
            if !value.is_null() {
                self.write_value(ty, value)?;
            }
        }
        Ok(())
    }

    fn write_value(&mut self, ty: &LogicalType, value: &Value) -> CheckpointResult<()> {
        match (ty, value) {
            (LogicalType::Boolean, Value::Boolean(v)) => self.writer.write_bool(*v)?,
            (LogicalType::Int8, Value::Int8(v)) => self.writer.write_u8(*v as u8)?,
            (LogicalType::Int16, Value::Int16(v)) => self.writer.write_u16(*v as u16)?,
            (LogicalType::Int32, Value::Int32(v)) => self.writer.write_i32(*v)?,
            (LogicalType::Int64, Value::Int64(v)) => self.writer.write_i64(*v)?,
            (LogicalType::Float32, Value::Float32(v)) => self.writer.write_u32(v.to_bits())?,
            (LogicalType::Float64, Value::Float64(v)) => self.writer.write_u64(v.to_bits())?,
            (LogicalType::Decimal { .. }, Value::Decimal(v)) => self.writer.write_i128(*v)?,
            (LogicalType::Timestamp, Value::Timestamp(v)) => self.writer.write_i64(*v)?,
            (LogicalType::Date, Value::Date(v)) => self.writer.write_i32(*v)?,
            (LogicalType::Varchar, Value::Varchar(v)) => self.writer.write_string(v)?,
            (LogicalType::List(element), Value::List(items)) => {
                self.write_elements(element, items)?;
            }
            (LogicalType::Map { key, value }, Value::List(items)) => {
                let entry = LogicalType::map_entry_type(key, value);
                self.write_elements(&entry, items)?;
            }
            (LogicalType::Struct(children), Value::Struct(fields)) => {
                for ((_, child_ty), field) in children.iter().zip(fields.iter()) {
                    self.write_nullable(child_ty, field)?;
                }
            }
            (ty, value) => {
                return Err(CheckpointError::corrupt(format!(
                    "value {value} cannot be stored as {ty}"
                )))
            }
        }
        Ok(())
    }

    fn write_elements(&mut self, element: &LogicalType, items: &[Value]) -> CheckpointResult<()> {
        self.writer.write_u32(items.len() as u32)?;
        for item in items {
            self.write_nullable(element, item)?;
        }
        Ok(())
    }

    fn write_nullable(&mut self, ty: &LogicalType, value: &Value) -> CheckpointResult<()> {
        if value.is_null() {
            self.writer.write_bool(false)?;
        } else {
            self.writer.write_bool(true)?;
            self.write_value(ty, value)?;
        }
        Ok(())
    }
}

/// Reads one table's rows back out of the table-data stream.
pub struct TableDataReader<'a> {
    reader: &'a mut MetaBlockReader,
}

impl<'a> TableDataReader<'a> {
    /// Creates a reader positioned at a table's data.
    pub fn new(reader: &'a mut MetaBlockReader) -> Self {
        Self { reader }
    }

    /// Reads the table contents into the bound info's collection.
    pub fn read_table_data(&mut self, bound: &mut BoundCreateTableInfo) -> CheckpointResult<()> {
        let types = bound.info.types();
        let chunk_count = self.reader.read_u32()?;
        for _ in 0..chunk_count {
            let chunk = self.read_chunk(&types)?;
            bound.data.append_chunk(&chunk)?;
        }
        Ok(())
    }

    fn read_chunk(&mut self, types: &[LogicalType]) -> CheckpointResult<DataChunk> {
        let rows = self.reader.read_u16()? as usize;
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(types.len());
        for ty in types {
            columns.push(self.read_column(ty, rows)?);
        }
        let mut chunk = DataChunk::from_types(types);
        for row in 0..rows {
            let values: Vec<Value> = columns.iter().map(|col| col[row].clone()).collect();
            chunk.append_row(&values)?;
        }
        Ok(chunk)
    }

    fn read_column(&mut self, ty: &LogicalType, rows: usize) -> CheckpointResult<Vec<Value>> {
        let validity = self.reader.read_bytes(rows.div_ceil(8))?;
        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            if validity[row / 8] & (1 << (row % 8)) != 0 {
                values.push(self.read_value(ty)?);
            } else {
                values.push(Value::Null);
            }
        }
        Ok(values)
    }

    fn read_value(&mut self, ty: &LogicalType) -> CheckpointResult<Value> {
        Ok(match ty {
            LogicalType::Boolean => Value::Boolean(self.reader.read_bool()?),
            LogicalType::Int8 => Value::Int8(self.reader.read_u8()? as i8),
            LogicalType::Int16 => Value::Int16(self.reader.read_u16()? as i16),
            LogicalType::Int32 => Value::Int32(self.reader.read_i32()?),
            LogicalType::Int64 => Value::Int64(self.reader.read_i64()?),
            LogicalType::Float32 => Value::Float32(f32::from_bits(self.reader.read_u32()?)),
            LogicalType::Float64 => Value::Float64(f64::from_bits(self.reader.read_u64()?)),
            LogicalType::Decimal { .. } => Value::Decimal(self.reader.read_i128()?),
            LogicalType::Timestamp => Value::Timestamp(self.reader.read_i64()?),
            LogicalType::Date => Value::Date(self.reader.read_i32()?),
            LogicalType::Varchar => Value::Varchar(self.reader.read_string()?),
            LogicalType::List(element) => Value::List(self.read_elements(element)?),
            LogicalType::Map { key, value } => {
                let entry = LogicalType::map_entry_type(key, value);
                Value::List(self.read_elements(&entry)?)
            }
            LogicalType::Struct(children) => {
                let mut fields = Vec::with_capacity(children.len());
                for (_, child_ty) in children {
                    fields.push(self.read_nullable(child_ty)?);
                }
                Value::Struct(fields)
            }
        })
    }

    fn read_elements(&mut self, element: &LogicalType) -> CheckpointResult<Vec<Value>> {
        let count = self.reader.read_u32()? as usize;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read_nullable(element)?);
        }
        Ok(items)
    }

    fn read_nullable(&mut self, ty: &LogicalType) -> CheckpointResult<Value> {
        if self.reader.read_bool()? {
            self.read_value(ty)
        } else {
            Ok(Value::Null)
        }
    }
}
