//! Dynamically-typed cell values.
//!
//! A `Value` is one cell of one row. Vectors hold values of a single
//! logical type; `Value::is_of` is the check used by chunk verification.

use std::fmt;

use super::LogicalType;

/// A single dynamically-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL; valid for every logical type.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Unscaled decimal payload; width/scale come from the column type.
    Decimal(i128),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
    /// UTF-8 string.
    Varchar(String),
    /// List of element values.
    List(Vec<Value>),
    /// Struct field values in declaration order.
    Struct(Vec<Value>),
}

impl Value {
    /// Convenience constructor for integer values.
    #[must_use]
    pub fn int32(v: i32) -> Self {
        Self::Int32(v)
    }

    /// Convenience constructor for string values.
    #[must_use]
    pub fn varchar(v: impl Into<String>) -> Self {
        Self::Varchar(v.into())
    }

    /// Returns true if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Checks whether this value is a member of the given logical type.
    ///
    /// NULL belongs to every type. A map-typed column stores its rows as a
    /// list of `{key, value}` structs, so a `Value::List` of two-field
    /// structs satisfies `Map`.
    #[must_use]
    pub fn is_of(&self, ty: &LogicalType) -> bool {
        match (self, ty) {
            (Self::Null, _) => true,
            (Self::Boolean(_), LogicalType::Boolean) => true,
            (Self::Int8(_), LogicalType::Int8) => true,
            (Self::Int16(_), LogicalType::Int16) => true,
            (Self::Int32(_), LogicalType::Int32) => true,
            (Self::Int64(_), LogicalType::Int64) => true,
            (Self::Float32(_), LogicalType::Float32) => true,
            (Self::Float64(_), LogicalType::Float64) => true,
            (Self::Decimal(_), LogicalType::Decimal { .. }) => true,
            (Self::Timestamp(_), LogicalType::Timestamp) => true,
            (Self::Date(_), LogicalType::Date) => true,
            (Self::Varchar(_), LogicalType::Varchar) => true,
            (Self::List(values), LogicalType::List(element)) => {
                values.iter().all(|v| v.is_of(element))
            }
            (Self::List(values), LogicalType::Map { key, value }) => {
                let entry = LogicalType::map_entry_type(key, value);
                values.iter().all(|v| v.is_of(&entry))
            }
            (Self::Struct(values), LogicalType::Struct(children)) => {
                values.len() == children.len()
                    && values
                        .iter()
                        .zip(children.iter())
                        .all(|(v, (_, child_ty))| v.is_of(child_ty))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int8(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{v}"),
            Self::Varchar(v) => write!(f, "'{v}'"),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Struct(values) => {
                write!(f, "{{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_of_everything() {
        assert!(Value::Null.is_of(&LogicalType::Int32));
        assert!(Value::Null.is_of(&LogicalType::Varchar));
        assert!(Value::Null.is_of(&LogicalType::list(LogicalType::Int32)));
    }

    #[test]
    fn test_scalar_type_checks() {
        assert!(Value::Int32(1).is_of(&LogicalType::Int32));
        assert!(!Value::Int32(1).is_of(&LogicalType::Int64));
        assert!(Value::varchar("x").is_of(&LogicalType::Varchar));
        assert!(Value::Decimal(100).is_of(&LogicalType::Decimal { width: 9, scale: 2 }));
    }

    #[test]
    fn test_nested_type_checks() {
        let list = Value::List(vec![Value::Int32(1), Value::Null, Value::Int32(3)]);
        assert!(list.is_of(&LogicalType::list(LogicalType::Int32)));
        assert!(!list.is_of(&LogicalType::list(LogicalType::Varchar)));

        let row = Value::Struct(vec![Value::Int32(1), Value::varchar("a")]);
        let ty = LogicalType::struct_of(vec![
            ("id", LogicalType::Int32),
            ("name", LogicalType::Varchar),
        ]);
        assert!(row.is_of(&ty));

        let short = Value::Struct(vec![Value::Int32(1)]);
        assert!(!short.is_of(&ty));
    }

    #[test]
    fn test_map_representation() {
        let ty = LogicalType::map(LogicalType::Varchar, LogicalType::Int64);
        let entries = Value::List(vec![
            Value::Struct(vec![Value::varchar("a"), Value::Int64(1)]),
            Value::Struct(vec![Value::varchar("b"), Value::Int64(2)]),
        ]);
        assert!(entries.is_of(&ty));
    }

    #[test]
    fn test_display() {
        let list = Value::List(vec![Value::Int32(1), Value::Null]);
        assert_eq!(list.to_string(), "[1, NULL]");
        assert_eq!(Value::varchar("hi").to_string(), "'hi'");
    }
}
