//! Meta-stream serialization of logical types and catalog entries.
//!
//! Every writer has a mirror-image reader consuming the exact same field
//! order; there are no sentinels, only counts. Deserializers return
//! create-info structs so recovery can replay them through the ordinary
//! catalog operations.

use strata_common::types::LogicalType;
use strata_storage::{MetaBlockReader, MetaBlockWriter};

use crate::entry::{MacroEntry, SchemaEntry, SequenceEntry, TableEntry, ViewEntry};
use crate::error::{CatalogError, CatalogResult};
use crate::info::{
    CreateMacroInfo, CreateSchemaInfo, CreateSequenceInfo, CreateTableInfo, CreateViewInfo,
    OnConflict,
};

// =============================================================================
// Logical types
// =============================================================================

mod type_tag {
    pub const BOOLEAN: u8 = 1;
    pub const INT8: u8 = 2;
    pub const INT16: u8 = 3;
    pub const INT32: u8 = 4;
    pub const INT64: u8 = 5;
    pub const FLOAT32: u8 = 6;
    pub const FLOAT64: u8 = 7;
    pub const DECIMAL: u8 = 8;
    pub const TIMESTAMP: u8 = 9;
    pub const DATE: u8 = 10;
    pub const VARCHAR: u8 = 11;
    pub const LIST: u8 = 12;
    pub const MAP: u8 = 13;
    pub const STRUCT: u8 = 14;
}

/// Writes a logical type (tag byte plus nested payload).
pub fn write_logical_type(writer: &mut MetaBlockWriter, ty: &LogicalType) -> CatalogResult<()> {
    match ty {
        LogicalType::Boolean => writer.write_u8(type_tag::BOOLEAN)?,
        LogicalType::Int8 => writer.write_u8(type_tag::INT8)?,
        LogicalType::Int16 => writer.write_u8(type_tag::INT16)?,
        LogicalType::Int32 => writer.write_u8(type_tag::INT32)?,
        LogicalType::Int64 => writer.write_u8(type_tag::INT64)?,
        LogicalType::Float32 => writer.write_u8(type_tag::FLOAT32)?,
        LogicalType::Float64 => writer.write_u8(type_tag::FLOAT64)?,
        LogicalType::Decimal { width, scale } => {
            writer.write_u8(type_tag::DECIMAL)?;
            writer.write_u8(*width)?;
            writer.write_u8(*scale)?;
        }
        LogicalType::Timestamp => writer.write_u8(type_tag::TIMESTAMP)?,
        LogicalType::Date => writer.write_u8(type_tag::DATE)?,
        LogicalType::Varchar => writer.write_u8(type_tag::VARCHAR)?,
        LogicalType::List(element) => {
            writer.write_u8(type_tag::LIST)?;
            write_logical_type(writer, element)?;
        }
        LogicalType::Map { key, value } => {
            writer.write_u8(type_tag::MAP)?;
            write_logical_type(writer, key)?;
            write_logical_type(writer, value)?;
        }
        LogicalType::Struct(children) => {
            writer.write_u8(type_tag::STRUCT)?;
            writer.write_u32(children.len() as u32)?;
            for (name, child) in children {
                writer.write_string(name)?;
                write_logical_type(writer, child)?;
            }
        }
    }
    Ok(())
}

/// Reads a logical type.
pub fn read_logical_type(reader: &mut MetaBlockReader) -> CatalogResult<LogicalType> {
    let tag = reader.read_u8()?;
    Ok(match tag {
        type_tag::BOOLEAN => LogicalType::Boolean,
        type_tag::INT8 => LogicalType::Int8,
        type_tag::INT16 => LogicalType::Int16,
        type_tag::INT32 => LogicalType::Int32,
        type_tag::INT64 => LogicalType::Int64,
        type_tag::FLOAT32 => LogicalType::Float32,
        type_tag::FLOAT64 => LogicalType::Float64,
        type_tag::DECIMAL => LogicalType::Decimal {
            width: reader.read_u8()?,
            scale: reader.read_u8()?,
        },
        type_tag::TIMESTAMP => LogicalType::Timestamp,
        type_tag::DATE => LogicalType::Date,
        type_tag::VARCHAR => LogicalType::Varchar,
        type_tag::LIST => LogicalType::List(Box::new(read_logical_type(reader)?)),
        type_tag::MAP => {
            let key = read_logical_type(reader)?;
            let value = read_logical_type(reader)?;
            LogicalType::Map {
                key: Box::new(key),
                value: Box::new(value),
            }
        }
        type_tag::STRUCT => {
            let count = reader.read_u32()? as usize;
            let mut children = Vec::with_capacity(count);
            for _ in 0..count {
                let name = reader.read_string()?;
                let child = read_logical_type(reader)?;
                children.push((name, child));
            }
            LogicalType::Struct(children)
        }
        tag => return Err(CatalogError::UnknownTypeTag { tag }),
    })
}

// =============================================================================
// Catalog entries
// =============================================================================

impl SchemaEntry {
    /// Writes the schema definition.
    pub fn serialize(&self, writer: &mut MetaBlockWriter) -> CatalogResult<()> {
        writer.write_string(&self.name)?;
        Ok(())
    }

    /// Reads a schema definition back as a create info.
    pub fn deserialize(reader: &mut MetaBlockReader) -> CatalogResult<CreateSchemaInfo> {
        Ok(CreateSchemaInfo::new(reader.read_string()?))
    }
}

impl TableEntry {
    /// Writes the table definition (not its data).
    pub fn serialize(&self, writer: &mut MetaBlockWriter) -> CatalogResult<()> {
        writer.write_string(&self.name)?;
        writer.write_u32(self.columns.len() as u32)?;
        for column in &self.columns {
            writer.write_string(&column.name)?;
            write_logical_type(writer, &column.ty)?;
        }
        Ok(())
    }

    /// Reads a table definition back as a create info targeting `schema`.
    pub fn deserialize(
        reader: &mut MetaBlockReader,
        schema: &str,
    ) -> CatalogResult<CreateTableInfo> {
        let name = reader.read_string()?;
        let column_count = reader.read_u32()? as usize;
        let mut info = CreateTableInfo::new(name)
            .in_schema(schema)
            .with_on_conflict(OnConflict::Error);
        for _ in 0..column_count {
            let column_name = reader.read_string()?;
            let ty = read_logical_type(reader)?;
            info = info.with_column(column_name, ty);
        }
        Ok(info)
    }
}

impl ViewEntry {
    /// Writes the view definition.
    pub fn serialize(&self, writer: &mut MetaBlockWriter) -> CatalogResult<()> {
        writer.write_string(&self.name)?;
        writer.write_string(&self.definition)?;
        writer.write_u32(self.column_names.len() as u32)?;
        for name in &self.column_names {
            writer.write_string(name)?;
        }
        Ok(())
    }

    /// Reads a view definition back as a create info targeting `schema`.
    pub fn deserialize(
        reader: &mut MetaBlockReader,
        schema: &str,
    ) -> CatalogResult<CreateViewInfo> {
        let name = reader.read_string()?;
        let definition = reader.read_string()?;
        let count = reader.read_u32()? as usize;
        let mut column_names = Vec::with_capacity(count);
        for _ in 0..count {
            column_names.push(reader.read_string()?);
        }
        Ok(CreateViewInfo::new(name, definition)
            .in_schema(schema)
            .with_column_names(column_names))
    }
}

impl SequenceEntry {
    /// Writes the sequence definition, including its current position.
    pub fn serialize(&self, writer: &mut MetaBlockWriter) -> CatalogResult<()> {
        writer.write_string(&self.name)?;
        writer.write_i64(self.start)?;
        writer.write_i64(self.increment)?;
        writer.write_i64(self.min_value)?;
        writer.write_i64(self.max_value)?;
        writer.write_bool(self.cycle)?;
        match self.last_value() {
            Some(value) => {
                writer.write_bool(true)?;
                writer.write_i64(value)?;
            }
            None => writer.write_bool(false)?,
        }
        Ok(())
    }

    /// Reads a sequence definition back as a create info targeting `schema`.
    pub fn deserialize(
        reader: &mut MetaBlockReader,
        schema: &str,
    ) -> CatalogResult<CreateSequenceInfo> {
        let mut info = CreateSequenceInfo::new(reader.read_string()?).in_schema(schema);
        info.start = reader.read_i64()?;
        info.increment = reader.read_i64()?;
        info.min_value = reader.read_i64()?;
        info.max_value = reader.read_i64()?;
        info.cycle = reader.read_bool()?;
        info.last_value = if reader.read_bool()? {
            Some(reader.read_i64()?)
        } else {
            None
        };
        Ok(info)
    }
}

impl MacroEntry {
    /// Writes the macro definition.
    pub fn serialize(&self, writer: &mut MetaBlockWriter) -> CatalogResult<()> {
        writer.write_string(&self.name)?;
        writer.write_u32(self.parameters.len() as u32)?;
        for parameter in &self.parameters {
            writer.write_string(parameter)?;
        }
        writer.write_string(&self.body)?;
        Ok(())
    }

    /// Reads a macro definition back as a create info targeting `schema`.
    pub fn deserialize(
        reader: &mut MetaBlockReader,
        schema: &str,
    ) -> CatalogResult<CreateMacroInfo> {
        let name = reader.read_string()?;
        let count = reader.read_u32()? as usize;
        let mut parameters = Vec::with_capacity(count);
        for _ in 0..count {
            parameters.push(reader.read_string()?);
        }
        let body = reader.read_string()?;
        Ok(CreateMacroInfo::new(name, body)
            .in_schema(schema)
            .with_parameters(parameters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_common::config::BlockConfig;
    use strata_storage::{BlockManager, InMemoryBlockManager};

    fn stream() -> (Arc<dyn BlockManager>, MetaBlockWriter) {
        let manager: Arc<dyn BlockManager> = Arc::new(InMemoryBlockManager::new(
            &BlockConfig::default().with_block_size(4096),
        ));
        let writer = MetaBlockWriter::new(Arc::clone(&manager)).unwrap();
        (manager, writer)
    }

    #[test]
    fn test_logical_type_round_trip() {
        let types = vec![
            LogicalType::Boolean,
            LogicalType::Int32,
            LogicalType::Decimal { width: 18, scale: 4 },
            LogicalType::Varchar,
            LogicalType::list(LogicalType::Timestamp),
            LogicalType::map(LogicalType::Varchar, LogicalType::Int64),
            LogicalType::struct_of(vec![
                ("id", LogicalType::Int64),
                ("tags", LogicalType::list(LogicalType::Varchar)),
            ]),
        ];

        let (manager, mut writer) = stream();
        let root = writer.current_block();
        for ty in &types {
            write_logical_type(&mut writer, ty).unwrap();
        }
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        for ty in &types {
            assert_eq!(&read_logical_type(&mut reader).unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let (manager, mut writer) = stream();
        let root = writer.current_block();
        writer.write_u8(200).unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        let err = read_logical_type(&mut reader).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownTypeTag { tag: 200 }));
    }

    #[test]
    fn test_sequence_round_trip_keeps_position() {
        let sequence = SequenceEntry::from_info(
            CreateSequenceInfo::new("ids").with_start(10).with_increment(5),
        );
        sequence.next_value().unwrap();
        sequence.next_value().unwrap();

        let (manager, mut writer) = stream();
        let root = writer.current_block();
        sequence.serialize(&mut writer).unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        let info = SequenceEntry::deserialize(&mut reader, "main").unwrap();
        assert_eq!(info.start, 10);
        assert_eq!(info.increment, 5);
        assert_eq!(info.last_value, Some(15));

        // The restored sequence continues where it left off.
        let restored = SequenceEntry::from_info(info);
        assert_eq!(restored.next_value().unwrap(), 20);
    }

    #[test]
    fn test_macro_round_trip() {
        let entry = MacroEntry::from_info(
            CreateMacroInfo::new("add", "a + b")
                .with_parameters(vec!["a".to_string(), "b".to_string()]),
        );

        let (manager, mut writer) = stream();
        let root = writer.current_block();
        entry.serialize(&mut writer).unwrap();
        writer.flush().unwrap();

        let mut reader = MetaBlockReader::new(manager, root).unwrap();
        let info = MacroEntry::deserialize(&mut reader, "main").unwrap();
        assert_eq!(info.name, "add");
        assert_eq!(info.parameters, vec!["a", "b"]);
        assert_eq!(info.body, "a + b");
    }
}
