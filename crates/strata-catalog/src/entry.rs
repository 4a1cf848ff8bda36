//! Catalog entries.
//!
//! A schema owns two scopes, mirroring how lookups work: the table scope
//! (tables and views share a namespace) and the function scope (macros,
//! and whatever function kinds come later). Sequences have their own
//! namespace. All scopes iterate in name order, which is what gives
//! checkpoints a deterministic layout.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use strata_column::ColumnDataCollection;
use strata_common::types::LogicalType;

use crate::error::{CatalogError, CatalogResult};
use crate::info::{CreateMacroInfo, CreateSequenceInfo, CreateViewInfo, OnConflict};

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: LogicalType,
}

impl ColumnDefinition {
    /// Creates a column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: LogicalType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A reference to any non-schema catalog entry.
#[derive(Clone)]
pub enum CatalogEntry {
    /// A base table.
    Table(Arc<TableEntry>),
    /// A view.
    View(Arc<ViewEntry>),
    /// A sequence.
    Sequence(Arc<SequenceEntry>),
    /// A macro.
    Macro(Arc<MacroEntry>),
}

impl CatalogEntry {
    /// The entry's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Table(e) => &e.name,
            Self::View(e) => &e.name,
            Self::Sequence(e) => &e.name,
            Self::Macro(e) => &e.name,
        }
    }

    /// The entry kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Table(_) => "table",
            Self::View(_) => "view",
            Self::Sequence(_) => "sequence",
            Self::Macro(_) => "macro",
        }
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.name())
    }
}

/// A base table: definition plus its row data.
pub struct TableEntry {
    /// Table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<ColumnDefinition>,
    /// The table's row data.
    pub data: RwLock<ColumnDataCollection>,
}

impl TableEntry {
    /// Creates a table entry owning the given data collection.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        data: ColumnDataCollection,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            data: RwLock::new(data),
        }
    }

    /// Column types in declaration order.
    #[must_use]
    pub fn types(&self) -> Vec<LogicalType> {
        self.columns.iter().map(|c| c.ty.clone()).collect()
    }

    /// Number of rows currently stored.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.read().count()
    }
}

impl std::fmt::Debug for TableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableEntry")
            .field("name", &self.name)
            .field("columns", &self.columns.len())
            .field("rows", &self.row_count())
            .finish()
    }
}

/// A view: a named definition over other entries.
#[derive(Debug)]
pub struct ViewEntry {
    /// View name.
    pub name: String,
    /// The definition text.
    pub definition: String,
    /// Optional column aliases.
    pub column_names: Vec<String>,
}

impl ViewEntry {
    /// Creates a view entry from its info.
    #[must_use]
    pub fn from_info(info: CreateViewInfo) -> Self {
        Self {
            name: info.view,
            definition: info.definition,
            column_names: info.column_names,
        }
    }
}

/// A sequence generator.
#[derive(Debug)]
pub struct SequenceEntry {
    /// Sequence name.
    pub name: String,
    /// First value.
    pub start: i64,
    /// Step between values.
    pub increment: i64,
    /// Lower bound.
    pub min_value: i64,
    /// Upper bound.
    pub max_value: i64,
    /// Whether the sequence wraps at its bounds.
    pub cycle: bool,
    /// Last value handed out, if any.
    last_value: Mutex<Option<i64>>,
}

impl SequenceEntry {
    /// Creates a sequence entry from its info.
    #[must_use]
    pub fn from_info(info: CreateSequenceInfo) -> Self {
        Self {
            name: info.name,
            start: info.start,
            increment: info.increment,
            min_value: info.min_value,
            max_value: info.max_value,
            cycle: info.cycle,
            last_value: Mutex::new(info.last_value),
        }
    }

    /// Returns the last value handed out, if any.
    #[must_use]
    pub fn last_value(&self) -> Option<i64> {
        *self.last_value.lock()
    }

    /// Hands out the next sequence value.
    pub fn next_value(&self) -> CatalogResult<i64> {
        let mut last = self.last_value.lock();
        let next = match *last {
            None => self.start,
            Some(value) => match value.checked_add(self.increment) {
                Some(next) if next >= self.min_value && next <= self.max_value => next,
                _ if self.cycle => {
                    if self.increment > 0 {
                        self.min_value
                    } else {
                        self.max_value
                    }
                }
                _ => {
                    return Err(CatalogError::SequenceExhausted {
                        name: self.name.clone(),
                    })
                }
            },
        };
        *last = Some(next);
        Ok(next)
    }
}

/// A macro: a named, parameterized expression body.
#[derive(Debug)]
pub struct MacroEntry {
    /// Macro name.
    pub name: String,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// The body text.
    pub body: String,
}

impl MacroEntry {
    /// Creates a macro entry from its info.
    #[must_use]
    pub fn from_info(info: CreateMacroInfo) -> Self {
        Self {
            name: info.name,
            parameters: info.parameters,
            body: info.body,
        }
    }
}

/// One schema: a named collection of entry scopes.
pub struct SchemaEntry {
    /// Schema name.
    pub name: String,
    /// Tables and views (shared namespace).
    table_scope: RwLock<BTreeMap<String, CatalogEntry>>,
    /// Sequences.
    sequences: RwLock<BTreeMap<String, Arc<SequenceEntry>>>,
    /// Macros and future function kinds (shared namespace).
    function_scope: RwLock<BTreeMap<String, CatalogEntry>>,
}

impl SchemaEntry {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_scope: RwLock::new(BTreeMap::new()),
            sequences: RwLock::new(BTreeMap::new()),
            function_scope: RwLock::new(BTreeMap::new()),
        }
    }

    fn insert_scoped(
        scope: &RwLock<BTreeMap<String, CatalogEntry>>,
        entry: CatalogEntry,
        on_conflict: OnConflict,
    ) -> CatalogResult<CatalogEntry> {
        let mut guard = scope.write();
        if let Some(existing) = guard.get(entry.name()) {
            return match on_conflict {
                OnConflict::Ignore => Ok(existing.clone()),
                OnConflict::Error => Err(CatalogError::AlreadyExists {
                    kind: existing.kind(),
                    name: existing.name().to_string(),
                }),
            };
        }
        guard.insert(entry.name().to_string(), entry.clone());
        Ok(entry)
    }

    /// Adds a table to the table scope.
    pub fn add_table(
        &self,
        table: Arc<TableEntry>,
        on_conflict: OnConflict,
    ) -> CatalogResult<CatalogEntry> {
        Self::insert_scoped(&self.table_scope, CatalogEntry::Table(table), on_conflict)
    }

    /// Adds a view to the table scope.
    pub fn add_view(
        &self,
        view: Arc<ViewEntry>,
        on_conflict: OnConflict,
    ) -> CatalogResult<CatalogEntry> {
        Self::insert_scoped(&self.table_scope, CatalogEntry::View(view), on_conflict)
    }

    /// Adds a sequence.
    pub fn add_sequence(
        &self,
        sequence: Arc<SequenceEntry>,
        on_conflict: OnConflict,
    ) -> CatalogResult<Arc<SequenceEntry>> {
        let mut guard = self.sequences.write();
        if let Some(existing) = guard.get(&sequence.name) {
            return match on_conflict {
                OnConflict::Ignore => Ok(Arc::clone(existing)),
                OnConflict::Error => Err(CatalogError::AlreadyExists {
                    kind: "sequence",
                    name: sequence.name.clone(),
                }),
            };
        }
        guard.insert(sequence.name.clone(), Arc::clone(&sequence));
        Ok(sequence)
    }

    /// Adds a macro to the function scope.
    pub fn add_macro(
        &self,
        entry: Arc<MacroEntry>,
        on_conflict: OnConflict,
    ) -> CatalogResult<CatalogEntry> {
        Self::insert_scoped(&self.function_scope, CatalogEntry::Macro(entry), on_conflict)
    }

    /// Looks up a table.
    pub fn table(&self, name: &str) -> CatalogResult<Arc<TableEntry>> {
        match self.table_scope.read().get(name) {
            Some(CatalogEntry::Table(table)) => Ok(Arc::clone(table)),
            _ => Err(CatalogError::NotFound {
                kind: "table",
                name: name.to_string(),
            }),
        }
    }

    /// Looks up a view.
    pub fn view(&self, name: &str) -> CatalogResult<Arc<ViewEntry>> {
        match self.table_scope.read().get(name) {
            Some(CatalogEntry::View(view)) => Ok(Arc::clone(view)),
            _ => Err(CatalogError::NotFound {
                kind: "view",
                name: name.to_string(),
            }),
        }
    }

    /// Looks up a sequence.
    pub fn sequence(&self, name: &str) -> CatalogResult<Arc<SequenceEntry>> {
        self.sequences
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound {
                kind: "sequence",
                name: name.to_string(),
            })
    }

    /// Looks up a macro.
    pub fn macro_entry(&self, name: &str) -> CatalogResult<Arc<MacroEntry>> {
        match self.function_scope.read().get(name) {
            Some(CatalogEntry::Macro(entry)) => Ok(Arc::clone(entry)),
            _ => Err(CatalogError::NotFound {
                kind: "macro",
                name: name.to_string(),
            }),
        }
    }

    /// Visits every entry in the table scope, in name order.
    pub fn scan_table_scope(&self, mut visitor: impl FnMut(&CatalogEntry)) {
        for entry in self.table_scope.read().values() {
            visitor(entry);
        }
    }

    /// Visits every sequence, in name order.
    pub fn scan_sequences(&self, mut visitor: impl FnMut(&Arc<SequenceEntry>)) {
        for entry in self.sequences.read().values() {
            visitor(entry);
        }
    }

    /// Visits every entry in the function scope, in name order.
    pub fn scan_function_scope(&self, mut visitor: impl FnMut(&CatalogEntry)) {
        for entry in self.function_scope.read().values() {
            visitor(entry);
        }
    }
}

impl std::fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("name", &self.name)
            .field("table_scope", &self.table_scope.read().len())
            .field("sequences", &self.sequences.read().len())
            .field("function_scope", &self.function_scope.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_next_value() {
        let seq = SequenceEntry::from_info(
            CreateSequenceInfo::new("s").with_start(5).with_increment(2),
        );
        assert_eq!(seq.last_value(), None);
        assert_eq!(seq.next_value().unwrap(), 5);
        assert_eq!(seq.next_value().unwrap(), 7);
        assert_eq!(seq.last_value(), Some(7));
    }

    #[test]
    fn test_sequence_exhaustion() {
        let mut info = CreateSequenceInfo::new("s");
        info.max_value = 2;
        let seq = SequenceEntry::from_info(info);
        seq.next_value().unwrap();
        seq.next_value().unwrap();
        let err = seq.next_value().unwrap_err();
        assert!(matches!(err, CatalogError::SequenceExhausted { .. }));
    }

    #[test]
    fn test_sequence_cycle() {
        let mut info = CreateSequenceInfo::new("s");
        info.max_value = 2;
        info.cycle = true;
        let seq = SequenceEntry::from_info(info);
        assert_eq!(seq.next_value().unwrap(), 1);
        assert_eq!(seq.next_value().unwrap(), 2);
        assert_eq!(seq.next_value().unwrap(), 1);
    }

    #[test]
    fn test_table_and_view_share_namespace() {
        let schema = SchemaEntry::new("s");
        let view = Arc::new(ViewEntry::from_info(CreateViewInfo::new("x", "select 1")));
        schema.add_view(view, OnConflict::Error).unwrap();

        let view2 = Arc::new(ViewEntry::from_info(CreateViewInfo::new("x", "select 2")));
        let err = schema.add_view(view2, OnConflict::Error).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists { .. }));
    }

    #[test]
    fn test_scan_order_is_name_order() {
        let schema = SchemaEntry::new("s");
        for name in ["zeta", "alpha", "mid"] {
            let view = Arc::new(ViewEntry::from_info(CreateViewInfo::new(name, "select 1")));
            schema.add_view(view, OnConflict::Error).unwrap();
        }
        let mut seen = Vec::new();
        schema.scan_table_scope(|entry| seen.push(entry.name().to_string()));
        assert_eq!(seen, vec!["alpha", "mid", "zeta"]);
    }
}
