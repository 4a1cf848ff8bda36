//! The logical type system.
//!
//! A `LogicalType` describes the shape of one column: either a scalar type
//! or a nested composite (list, map, struct). Types are cheap to clone and
//! deeply comparable.

use std::fmt;

/// A logical column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Boolean (true/false).
    Boolean,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 64-bit IEEE 754 floating point.
    Float64,
    /// Fixed-point decimal with the given width (total digits) and scale.
    Decimal {
        /// Total number of decimal digits.
        width: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// Microseconds since the Unix epoch.
    Timestamp,
    /// Days since the Unix epoch.
    Date,
    /// Variable-length UTF-8 string.
    Varchar,
    /// Variable-length list of elements of a single type.
    List(Box<LogicalType>),
    /// Key-value mapping; stored as a list of `{key, value}` structs.
    Map {
        /// Key type.
        key: Box<LogicalType>,
        /// Value type.
        value: Box<LogicalType>,
    },
    /// Composite of named child columns.
    Struct(Vec<(String, LogicalType)>),
}

impl LogicalType {
    /// Creates a list type over the given element type.
    #[must_use]
    pub fn list(element: LogicalType) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a map type over the given key and value types.
    #[must_use]
    pub fn map(key: LogicalType, value: LogicalType) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// Creates a struct type from `(name, type)` pairs.
    #[must_use]
    pub fn struct_of(children: Vec<(impl Into<String>, LogicalType)>) -> Self {
        Self::Struct(
            children
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Returns true if this is a nested type (list, map or struct).
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            Self::List(_) | Self::Map { .. } | Self::Struct(_)
        )
    }

    /// Returns the fixed on-disk width of the scalar payload, if any.
    ///
    /// Varchar and nested types have no fixed width.
    #[must_use]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 | Self::Float32 | Self::Date => Some(4),
            Self::Int64 | Self::Float64 | Self::Timestamp => Some(8),
            Self::Decimal { .. } => Some(16),
            Self::Varchar | Self::List(_) | Self::Map { .. } | Self::Struct(_) => None,
        }
    }

    /// Returns the struct child types for the storage representation of a
    /// map: `{key, value}`.
    #[must_use]
    pub fn map_entry_type(key: &LogicalType, value: &LogicalType) -> LogicalType {
        LogicalType::Struct(vec![
            ("key".to_string(), key.clone()),
            ("value".to_string(), value.clone()),
        ])
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Int8 => write!(f, "TINYINT"),
            Self::Int16 => write!(f, "SMALLINT"),
            Self::Int32 => write!(f, "INTEGER"),
            Self::Int64 => write!(f, "BIGINT"),
            Self::Float32 => write!(f, "FLOAT"),
            Self::Float64 => write!(f, "DOUBLE"),
            Self::Decimal { width, scale } => write!(f, "DECIMAL({width},{scale})"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Date => write!(f, "DATE"),
            Self::Varchar => write!(f, "VARCHAR"),
            Self::List(element) => write!(f, "LIST({element})"),
            Self::Map { key, value } => write!(f, "MAP({key},{value})"),
            Self::Struct(children) => {
                write!(f, "STRUCT(")?;
                for (i, (name, ty)) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} {ty}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_equality() {
        let a = LogicalType::struct_of(vec![
            ("id", LogicalType::Int32),
            ("tags", LogicalType::list(LogicalType::Varchar)),
        ]);
        let b = LogicalType::struct_of(vec![
            ("id", LogicalType::Int32),
            ("tags", LogicalType::list(LogicalType::Varchar)),
        ]);
        assert_eq!(a, b);

        let c = LogicalType::struct_of(vec![
            ("id", LogicalType::Int64),
            ("tags", LogicalType::list(LogicalType::Varchar)),
        ]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(LogicalType::Int32.fixed_width(), Some(4));
        assert_eq!(LogicalType::Timestamp.fixed_width(), Some(8));
        assert_eq!(
            LogicalType::Decimal { width: 18, scale: 3 }.fixed_width(),
            Some(16)
        );
        assert_eq!(LogicalType::Varchar.fixed_width(), None);
        assert_eq!(LogicalType::list(LogicalType::Int32).fixed_width(), None);
    }

    #[test]
    fn test_is_nested() {
        assert!(!LogicalType::Varchar.is_nested());
        assert!(LogicalType::list(LogicalType::Int32).is_nested());
        assert!(LogicalType::map(LogicalType::Varchar, LogicalType::Int64).is_nested());
        assert!(LogicalType::Struct(vec![]).is_nested());
    }

    #[test]
    fn test_display() {
        let ty = LogicalType::struct_of(vec![
            ("a", LogicalType::Int32),
            ("b", LogicalType::list(LogicalType::Varchar)),
        ]);
        assert_eq!(ty.to_string(), "STRUCT(a INTEGER, b LIST(VARCHAR))");
    }
}
