//! The catalog.
//!
//! Holds the schema map and the typed create operations. Schemas iterate
//! in name order; the default `main` schema always exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binder::BoundCreateTableInfo;
use crate::entry::{MacroEntry, SchemaEntry, SequenceEntry, TableEntry, ViewEntry};
use crate::error::{CatalogError, CatalogResult};
use crate::info::{
    CreateMacroInfo, CreateSchemaInfo, CreateSequenceInfo, CreateViewInfo, OnConflict,
};

/// Name of the schema that always exists.
pub const DEFAULT_SCHEMA: &str = "main";

/// The catalog: an ordered map of schemas.
pub struct Catalog {
    schemas: RwLock<BTreeMap<String, Arc<SchemaEntry>>>,
}

impl Catalog {
    /// Creates a catalog holding only the default schema.
    #[must_use]
    pub fn new() -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert(
            DEFAULT_SCHEMA.to_string(),
            Arc::new(SchemaEntry::new(DEFAULT_SCHEMA)),
        );
        Self {
            schemas: RwLock::new(schemas),
        }
    }

    /// Creates a schema.
    pub fn create_schema(&self, info: &CreateSchemaInfo) -> CatalogResult<Arc<SchemaEntry>> {
        let mut schemas = self.schemas.write();
        if let Some(existing) = schemas.get(&info.schema) {
            return match info.on_conflict {
                OnConflict::Ignore => Ok(Arc::clone(existing)),
                OnConflict::Error => Err(CatalogError::AlreadyExists {
                    kind: "schema",
                    name: info.schema.clone(),
                }),
            };
        }
        let schema = Arc::new(SchemaEntry::new(info.schema.clone()));
        schemas.insert(info.schema.clone(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Looks up a schema.
    pub fn schema(&self, name: &str) -> CatalogResult<Arc<SchemaEntry>> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind: "schema",
                name: name.to_string(),
            })
    }

    /// Visits every schema, in name order.
    pub fn scan_schemas(&self, mut visitor: impl FnMut(&Arc<SchemaEntry>)) {
        for schema in self.schemas.read().values() {
            visitor(schema);
        }
    }

    /// Number of schemas.
    #[must_use]
    pub fn schema_count(&self) -> usize {
        self.schemas.read().len()
    }

    /// Creates a table from a bound info.
    pub fn create_table(&self, bound: BoundCreateTableInfo) -> CatalogResult<Arc<TableEntry>> {
        let schema = self.schema(&bound.info.schema)?;
        let on_conflict = bound.info.on_conflict;
        let table = Arc::new(TableEntry::new(
            bound.info.table,
            bound.info.columns,
            bound.data,
        ));
        schema.add_table(Arc::clone(&table), on_conflict)?;
        Ok(table)
    }

    /// Creates a view.
    pub fn create_view(&self, info: CreateViewInfo) -> CatalogResult<Arc<ViewEntry>> {
        let schema = self.schema(&info.schema)?;
        let on_conflict = info.on_conflict;
        let view = Arc::new(ViewEntry::from_info(info));
        schema.add_view(Arc::clone(&view), on_conflict)?;
        Ok(view)
    }

    /// Creates a sequence.
    pub fn create_sequence(&self, info: CreateSequenceInfo) -> CatalogResult<Arc<SequenceEntry>> {
        let schema = self.schema(&info.schema)?;
        let on_conflict = info.on_conflict;
        let sequence = Arc::new(SequenceEntry::from_info(info));
        schema.add_sequence(sequence, on_conflict)
    }

    /// Creates a function-scope entry; macros are the only kind so far.
    pub fn create_function(&self, info: CreateMacroInfo) -> CatalogResult<Arc<MacroEntry>> {
        let schema = self.schema(&info.schema)?;
        let on_conflict = info.on_conflict;
        let entry = Arc::new(MacroEntry::from_info(info));
        schema.add_macro(Arc::clone(&entry), on_conflict)?;
        Ok(entry)
    }

    /// Convenience lookup of a table by qualified name.
    pub fn table(&self, schema: &str, name: &str) -> CatalogResult<Arc<TableEntry>> {
        self.schema(schema)?.table(name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("schemas", &self.schema_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Binder;
    use crate::info::CreateTableInfo;
    use strata_common::config::BufferConfig;
    use strata_common::types::LogicalType;
    use strata_storage::BufferManager;

    fn binder() -> Binder {
        Binder::new(Arc::new(BufferManager::new(BufferConfig::default())))
    }

    #[test]
    fn test_default_schema_exists() {
        let catalog = Catalog::new();
        assert!(catalog.schema(DEFAULT_SCHEMA).is_ok());
        assert_eq!(catalog.schema_count(), 1);
    }

    #[test]
    fn test_create_schema_conflicts() {
        let catalog = Catalog::new();
        catalog
            .create_schema(&CreateSchemaInfo::new("analytics"))
            .unwrap();

        let err = catalog
            .create_schema(&CreateSchemaInfo::new("analytics"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { .. }));

        // Ignore returns the existing schema.
        let existing = catalog
            .create_schema(
                &CreateSchemaInfo::new("analytics").with_on_conflict(OnConflict::Ignore),
            )
            .unwrap();
        assert_eq!(existing.name, "analytics");
    }

    #[test]
    fn test_create_and_lookup_table() {
        let catalog = Catalog::new();
        let info = CreateTableInfo::new("t").with_column("a", LogicalType::Int32);
        let bound = binder().bind_create_table_info(info).unwrap();
        catalog.create_table(bound).unwrap();

        let table = catalog.table(DEFAULT_SCHEMA, "t").unwrap();
        assert_eq!(table.types(), vec![LogicalType::Int32]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_scan_schemas_in_name_order() {
        let catalog = Catalog::new();
        catalog.create_schema(&CreateSchemaInfo::new("zz")).unwrap();
        catalog.create_schema(&CreateSchemaInfo::new("aa")).unwrap();

        let mut names = Vec::new();
        catalog.scan_schemas(|schema| names.push(schema.name.clone()));
        assert_eq!(names, vec!["aa", "main", "zz"]);
    }

    #[test]
    fn test_create_view_sequence_macro() {
        let catalog = Catalog::new();
        catalog
            .create_view(CreateViewInfo::new("v", "select * from t"))
            .unwrap();
        catalog.create_sequence(CreateSequenceInfo::new("s")).unwrap();
        catalog
            .create_function(
                CreateMacroInfo::new("twice", "x + x").with_parameters(vec!["x".to_string()]),
            )
            .unwrap();

        let schema = catalog.schema(DEFAULT_SCHEMA).unwrap();
        assert!(schema.view("v").is_ok());
        assert!(schema.sequence("s").is_ok());
        assert!(schema.macro_entry("twice").is_ok());
    }
}
