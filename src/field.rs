use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Type tag of a [`Field`]. Describes the columns of result sets and is inferred for each column
/// of a parameter data frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Boolean,
    Integer,
    FloatingPoint,
    String,
    Date,
    Timestamp,
}

impl FieldType {
    /// Size in bytes a single value of this type occupies in a fetch buffer. `None` for strings,
    /// since their size depends on the column they are fetched from.
    pub fn element_size(self) -> Option<usize> {
        match self {
            FieldType::Boolean => Some(1),
            FieldType::Integer | FieldType::FloatingPoint => Some(8),
            // Layout of SQL_DATE_STRUCT
            FieldType::Date => Some(6),
            // Layout of SQL_TIMESTAMP_STRUCT
            FieldType::Timestamp => Some(16),
            FieldType::String => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::FloatingPoint => "floating point",
            FieldType::String => "string",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A single scalar value of a parameter set or a result set row.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Boolean(bool),
    Integer(i64),
    FloatingPoint(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Boolean(_) => FieldType::Boolean,
            Field::Integer(_) => FieldType::Integer,
            Field::FloatingPoint(_) => FieldType::FloatingPoint,
            Field::String(_) => FieldType::String,
            Field::Date(_) => FieldType::Date,
            Field::Timestamp(_) => FieldType::Timestamp,
        }
    }
}

/// A field which may be `NULL`. `None` represents `NULL`.
pub type NullableField = Option<Field>;

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Boolean(value)
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Integer(value.into())
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Integer(value)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::FloatingPoint(value)
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::String(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_owned())
    }
}

impl From<NaiveDate> for Field {
    fn from(value: NaiveDate) -> Self {
        Field::Date(value)
    }
}

impl From<NaiveDateTime> for Field {
    fn from(value: NaiveDateTime) -> Self {
        Field::Timestamp(value)
    }
}
