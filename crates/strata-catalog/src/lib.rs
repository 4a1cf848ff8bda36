//! # strata-catalog
//!
//! The catalog tree: schemas containing tables, views, sequences and
//! macros, plus the create-info structs used to mutate it, a minimal
//! binder, and the meta-stream serialization of every entry kind.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Binder for create-table infos
pub mod binder;

/// The catalog and its schema entries
pub mod catalog;

/// Catalog entries
pub mod entry;

/// Error types
pub mod error;

/// Create-info structs
pub mod info;

/// Meta-stream serialization of types and entries
pub mod serialize;

pub use binder::{Binder, BoundCreateTableInfo};
pub use catalog::{Catalog, DEFAULT_SCHEMA};
pub use entry::{
    CatalogEntry, ColumnDefinition, MacroEntry, SchemaEntry, SequenceEntry, TableEntry, ViewEntry,
};
pub use error::{CatalogError, CatalogResult};
pub use info::{
    CreateMacroInfo, CreateSchemaInfo, CreateSequenceInfo, CreateTableInfo, CreateViewInfo,
    OnConflict,
};
