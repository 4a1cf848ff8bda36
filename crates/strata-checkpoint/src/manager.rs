//! The checkpoint manager.
//!
//! Writing walks the catalog in schema order and produces two independent
//! meta-block streams: the metadata stream (catalog definitions plus, per
//! table, a pointer into the second stream) and the table-data stream
//! (bulk rows). The new image commits atomically when the header naming
//! the metadata root is written; a crash before that point orphans the
//! fresh blocks and leaves the previous image intact.
//!
//! Loading mirrors the walk exactly: counts are read where counts were
//! written, entries where entries were written. The checkpoint is
//! quiescent: the caller guarantees no writer mutates the catalog or any
//! table while it runs.

use std::sync::Arc;

use tracing::{debug, info};

use strata_catalog::{
    Binder, Catalog, CatalogEntry, MacroEntry, OnConflict, SchemaEntry, SequenceEntry, TableEntry,
    ViewEntry,
};
use strata_common::types::BlockId;
use strata_storage::{
    BlockManager, BufferManager, DatabaseHeader, MetaBlockReader, MetaBlockWriter,
};

use crate::error::{CheckpointError, CheckpointResult};
use crate::table_data::{TableDataReader, TableDataWriter};

/// Writes and loads checkpoint images.
pub struct CheckpointManager {
    block_manager: Arc<dyn BlockManager>,
    buffer_manager: Arc<BufferManager>,
}

impl CheckpointManager {
    /// Creates a checkpoint manager over the given managers.
    #[must_use]
    pub fn new(block_manager: Arc<dyn BlockManager>, buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            block_manager,
            buffer_manager,
        }
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Serializes `catalog` and all table data into a new image and
    /// commits it.
    pub fn create_checkpoint(&self, catalog: &Catalog) -> CheckpointResult<()> {
        self.block_manager.start_checkpoint();

        let mut metadata_writer = MetaBlockWriter::new(Arc::clone(&self.block_manager))?;
        let mut tabledata_writer = MetaBlockWriter::new(Arc::clone(&self.block_manager))?;
        let meta_block = metadata_writer.current_block();

        let mut schemas = Vec::new();
        catalog.scan_schemas(|schema| schemas.push(Arc::clone(schema)));

        metadata_writer.write_u32(schemas.len() as u32)?;
        for schema in &schemas {
            self.write_schema(&mut metadata_writer, &mut tabledata_writer, schema)?;
        }

        metadata_writer.flush()?;
        tabledata_writer.flush()?;

        // The commit point: the image exists once the header names it.
        self.block_manager
            .write_header(&DatabaseHeader::new(meta_block))?;
        info!(
            schemas = schemas.len(),
            meta_block = %meta_block,
            "checkpoint committed"
        );
        Ok(())
    }

    fn write_schema(
        &self,
        metadata_writer: &mut MetaBlockWriter,
        tabledata_writer: &mut MetaBlockWriter,
        schema: &SchemaEntry,
    ) -> CheckpointResult<()> {
        schema.serialize(metadata_writer)?;

        let mut tables = Vec::new();
        let mut views = Vec::new();
        let mut foreign_kind: Option<&'static str> = None;
        schema.scan_table_scope(|entry| match entry {
            CatalogEntry::Table(table) => tables.push(Arc::clone(table)),
            CatalogEntry::View(view) => views.push(Arc::clone(view)),
            other => foreign_kind = Some(other.kind()),
        });
        if let Some(kind) = foreign_kind {
            return Err(CheckpointError::NotImplemented {
                entity: kind.to_string(),
            });
        }

        let mut sequences = Vec::new();
        schema.scan_sequences(|sequence| sequences.push(Arc::clone(sequence)));

        let mut macros = Vec::new();
        schema.scan_function_scope(|entry| match entry {
            CatalogEntry::Macro(entry) => macros.push(Arc::clone(entry)),
            other => foreign_kind = Some(other.kind()),
        });
        if let Some(kind) = foreign_kind {
            return Err(CheckpointError::NotImplemented {
                entity: kind.to_string(),
            });
        }

        debug!(
            schema = %schema.name,
            sequences = sequences.len(),
            tables = tables.len(),
            views = views.len(),
            macros = macros.len(),
            "writing schema"
        );

        metadata_writer.write_u32(sequences.len() as u32)?;
        for sequence in &sequences {
            sequence.serialize(metadata_writer)?;
        }
        metadata_writer.write_u32(tables.len() as u32)?;
        for table in &tables {
            self.write_table(metadata_writer, tabledata_writer, table)?;
        }
        metadata_writer.write_u32(views.len() as u32)?;
        for view in &views {
            view.serialize(metadata_writer)?;
        }
        metadata_writer.write_u32(macros.len() as u32)?;
        for entry in &macros {
            entry.serialize(metadata_writer)?;
        }
        Ok(())
    }

    fn write_table(
        &self,
        metadata_writer: &mut MetaBlockWriter,
        tabledata_writer: &mut MetaBlockWriter,
        table: &TableEntry,
    ) -> CheckpointResult<()> {
        table.serialize(metadata_writer)?;
        // Record where this table's rows start in the table-data stream.
        metadata_writer.write_i64(tabledata_writer.current_block().as_i64())?;
        metadata_writer.write_u64(tabledata_writer.offset())?;
        TableDataWriter::new(tabledata_writer).write_table_data(table)
    }

    // -------------------------------------------------------------------------
    // Read path
    // -------------------------------------------------------------------------

    /// Replays the committed image (if any) into `catalog`.
    pub fn load_from_storage(&self, catalog: &Catalog) -> CheckpointResult<()> {
        let meta_block = self.block_manager.meta_block();
        if !meta_block.is_valid() {
            debug!("no checkpoint image; storage is empty");
            return Ok(());
        }

        let mut reader = MetaBlockReader::new(Arc::clone(&self.block_manager), meta_block)?;
        let schema_count = reader.read_u32()?;
        for _ in 0..schema_count {
            self.read_schema(catalog, &mut reader)?;
        }
        info!(schemas = schema_count, "checkpoint image loaded");
        Ok(())
    }

    fn read_schema(&self, catalog: &Catalog, reader: &mut MetaBlockReader) -> CheckpointResult<()> {
        let mut info = SchemaEntry::deserialize(reader)?;
        // Recreating the default schema must not fail.
        info.on_conflict = OnConflict::Ignore;
        let schema_name = info.schema.clone();
        catalog.create_schema(&info)?;

        let sequence_count = reader.read_u32()?;
        for _ in 0..sequence_count {
            let info = SequenceEntry::deserialize(reader, &schema_name)?;
            catalog.create_sequence(info)?;
        }
        let table_count = reader.read_u32()?;
        for _ in 0..table_count {
            self.read_table(catalog, reader, &schema_name)?;
        }
        let view_count = reader.read_u32()?;
        for _ in 0..view_count {
            let info = ViewEntry::deserialize(reader, &schema_name)?;
            catalog.create_view(info)?;
        }
        let macro_count = reader.read_u32()?;
        for _ in 0..macro_count {
            let info = MacroEntry::deserialize(reader, &schema_name)?;
            catalog.create_function(info)?;
        }
        Ok(())
    }

    fn read_table(
        &self,
        catalog: &Catalog,
        reader: &mut MetaBlockReader,
        schema: &str,
    ) -> CheckpointResult<()> {
        let info = TableEntry::deserialize(reader, schema)?;
        let binder = Binder::new(Arc::clone(&self.buffer_manager));
        let mut bound = binder.bind_create_table_info(info)?;

        let block_id = BlockId::new(reader.read_i64()?);
        let offset = reader.read_u64()?;
        if !block_id.is_valid() {
            return Err(CheckpointError::corrupt(format!(
                "table \"{}\" points at an invalid data block",
                bound.info.table
            )));
        }
        let mut data_reader = MetaBlockReader::new(Arc::clone(&self.block_manager), block_id)?;
        data_reader.seek(offset);
        TableDataReader::new(&mut data_reader).read_table_data(&mut bound)?;

        catalog.create_table(bound)?;
        Ok(())
    }
}

impl std::fmt::Debug for CheckpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointManager").finish_non_exhaustive()
    }
}
