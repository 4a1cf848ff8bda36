//! Create-info structs.
//!
//! Each catalog mutation is described by an info struct carrying the
//! target schema, the definition, and the conflict policy.

use strata_common::types::LogicalType;

use crate::catalog::DEFAULT_SCHEMA;
use crate::entry::ColumnDefinition;

/// What to do when the target name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    /// Fail the operation.
    #[default]
    Error,
    /// Keep the existing entry and succeed.
    Ignore,
}

/// Describes a schema to create.
#[derive(Debug, Clone)]
pub struct CreateSchemaInfo {
    /// Schema name.
    pub schema: String,
    /// Conflict policy.
    pub on_conflict: OnConflict,
}

impl CreateSchemaInfo {
    /// Creates an info for the given schema name.
    #[must_use]
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            on_conflict: OnConflict::Error,
        }
    }

    /// Sets the conflict policy.
    #[must_use]
    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }
}

/// Describes a table to create.
#[derive(Debug, Clone)]
pub struct CreateTableInfo {
    /// Target schema.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Column definitions, in declaration order.
    pub columns: Vec<ColumnDefinition>,
    /// Conflict policy.
    pub on_conflict: OnConflict,
}

impl CreateTableInfo {
    /// Creates an info for a table in the default schema.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            columns: Vec::new(),
            on_conflict: OnConflict::Error,
        }
    }

    /// Sets the target schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Appends a column.
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, ty: LogicalType) -> Self {
        self.columns.push(ColumnDefinition::new(name, ty));
        self
    }

    /// Sets the conflict policy.
    #[must_use]
    pub fn with_on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    /// Column types in declaration order.
    #[must_use]
    pub fn types(&self) -> Vec<LogicalType> {
        self.columns.iter().map(|c| c.ty.clone()).collect()
    }
}

/// Describes a view to create.
#[derive(Debug, Clone)]
pub struct CreateViewInfo {
    /// Target schema.
    pub schema: String,
    /// View name.
    pub view: String,
    /// The view definition text.
    pub definition: String,
    /// Optional column aliases.
    pub column_names: Vec<String>,
    /// Conflict policy.
    pub on_conflict: OnConflict,
}

impl CreateViewInfo {
    /// Creates an info for a view in the default schema.
    #[must_use]
    pub fn new(view: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            view: view.into(),
            definition: definition.into(),
            column_names: Vec::new(),
            on_conflict: OnConflict::Error,
        }
    }

    /// Sets the target schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the column aliases.
    #[must_use]
    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = names;
        self
    }
}

/// Describes a sequence to create.
#[derive(Debug, Clone)]
pub struct CreateSequenceInfo {
    /// Target schema.
    pub schema: String,
    /// Sequence name.
    pub name: String,
    /// First value to hand out.
    pub start: i64,
    /// Step between values.
    pub increment: i64,
    /// Lower bound.
    pub min_value: i64,
    /// Upper bound.
    pub max_value: i64,
    /// Whether to wrap around at the bounds.
    pub cycle: bool,
    /// Last value handed out before this info was captured, if any.
    pub last_value: Option<i64>,
    /// Conflict policy.
    pub on_conflict: OnConflict,
}

impl CreateSequenceInfo {
    /// Creates an info for an ascending sequence starting at 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            name: name.into(),
            start: 1,
            increment: 1,
            min_value: 1,
            max_value: i64::MAX,
            cycle: false,
            last_value: None,
            on_conflict: OnConflict::Error,
        }
    }

    /// Sets the target schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the start value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Sets the increment.
    #[must_use]
    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment = increment;
        self
    }
}

/// Describes a macro to create.
#[derive(Debug, Clone)]
pub struct CreateMacroInfo {
    /// Target schema.
    pub schema: String,
    /// Macro name.
    pub name: String,
    /// Parameter names.
    pub parameters: Vec<String>,
    /// The macro body text.
    pub body: String,
    /// Conflict policy.
    pub on_conflict: OnConflict,
}

impl CreateMacroInfo {
    /// Creates an info for a macro in the default schema.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            name: name.into(),
            parameters: Vec::new(),
            body: body.into(),
            on_conflict: OnConflict::Error,
        }
    }

    /// Sets the target schema.
    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the parameter names.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }
}
