//! Binding of create-table infos.
//!
//! Binding validates a table definition and attaches the buffer-managed
//! collection that will hold the table's rows.

use std::collections::HashSet;
use std::sync::Arc;

use strata_column::ColumnDataCollection;
use strata_storage::BufferManager;

use crate::error::{CatalogError, CatalogResult};
use crate::info::CreateTableInfo;

/// A validated create-table info with its data collection.
#[derive(Debug)]
pub struct BoundCreateTableInfo {
    /// The validated definition.
    pub info: CreateTableInfo,
    /// The collection that will hold the table's rows.
    pub data: ColumnDataCollection,
}

/// Binds create-table infos against a buffer manager.
pub struct Binder {
    buffer_manager: Arc<BufferManager>,
}

impl Binder {
    /// Creates a binder allocating through the given buffer manager.
    #[must_use]
    pub fn new(buffer_manager: Arc<BufferManager>) -> Self {
        Self { buffer_manager }
    }

    /// Validates the definition and attaches an empty data collection.
    pub fn bind_create_table_info(
        &self,
        info: CreateTableInfo,
    ) -> CatalogResult<BoundCreateTableInfo> {
        if info.columns.is_empty() {
            return Err(CatalogError::InvalidInfo {
                kind: "table",
                message: format!("table \"{}\" has no columns", info.table),
            });
        }
        let mut seen = HashSet::new();
        for column in &info.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CatalogError::InvalidInfo {
                    kind: "table",
                    message: format!("duplicate column name \"{}\"", column.name),
                });
            }
        }
        let data = ColumnDataCollection::new(Arc::clone(&self.buffer_manager), info.types());
        Ok(BoundCreateTableInfo { info, data })
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder").finish_non_exhaustive()
    }
}
