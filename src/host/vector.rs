use crate::{Error, FieldType};

/// A column of the host runtime. Elements of the supported variants are optional, `None`
/// represents a missing value (`NA`).
#[derive(Clone, Debug, PartialEq)]
pub enum HostVector {
    Logical(Vec<Option<bool>>),
    Integer(Vec<Option<i32>>),
    Double(Vec<Option<f64>>),
    Character(Vec<Option<String>>),
    /// Days since 1970-01-01.
    Date(Vec<Option<f64>>),
    /// Seconds since the Unix epoch, UTC.
    DateTime(Vec<Option<f64>>),
    /// Complex numbers. No field type represents them.
    Complex(Vec<Option<(f64, f64)>>),
    /// Raw bytes. No field type represents them.
    Raw(Vec<u8>),
}

impl HostVector {
    pub fn len(&self) -> usize {
        match self {
            HostVector::Logical(values) => values.len(),
            HostVector::Integer(values) => values.len(),
            HostVector::Double(values)
            | HostVector::Date(values)
            | HostVector::DateTime(values) => values.len(),
            HostVector::Character(values) => values.len(),
            HostVector::Complex(values) => values.len(),
            HostVector::Raw(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the variant as the host runtime would call it.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostVector::Logical(_) => "logical",
            HostVector::Integer(_) => "integer",
            HostVector::Double(_) => "double",
            HostVector::Character(_) => "character",
            HostVector::Date(_) => "Date",
            HostVector::DateTime(_) => "POSIXct",
            HostVector::Complex(_) => "complex",
            HostVector::Raw(_) => "raw",
        }
    }

    /// An empty vector able to hold the values of a result set column of the given type.
    pub(crate) fn for_field_type(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Boolean => HostVector::Logical(Vec::with_capacity(capacity)),
            // The host has no 64 bit integers, but doubles represent them up to 2^53 exactly.
            FieldType::Integer | FieldType::FloatingPoint => {
                HostVector::Double(Vec::with_capacity(capacity))
            }
            FieldType::String => HostVector::Character(Vec::with_capacity(capacity)),
            FieldType::Date => HostVector::Date(Vec::with_capacity(capacity)),
            FieldType::Timestamp => HostVector::DateTime(Vec::with_capacity(capacity)),
        }
    }
}

/// Host type of a column, as far as it can be converted into fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostType {
    Logical,
    Integer,
    Double,
    Character,
    Date,
    DateTime,
}

impl HostType {
    /// Type of the fields values of this host type are converted to.
    pub fn field_type(self) -> FieldType {
        match self {
            HostType::Logical => FieldType::Boolean,
            HostType::Integer => FieldType::Integer,
            HostType::Double => FieldType::FloatingPoint,
            HostType::Character => FieldType::String,
            HostType::Date => FieldType::Date,
            HostType::DateTime => FieldType::Timestamp,
        }
    }
}

/// A table of named host columns with equal length. Used as input for parameter sets as well as
/// the materialized form of result sets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<HostVector>,
    num_rows: usize,
}

impl DataFrame {
    /// Fails if the columns differ in length.
    ///
    /// ```
    /// use odbc_cursor::{DataFrame, HostVector};
    ///
    /// let frame = DataFrame::new([
    ///     ("id", HostVector::Integer(vec![Some(1), Some(2)])),
    ///     ("name", HostVector::Character(vec![Some("one".to_owned()), None])),
    /// ])?;
    /// assert_eq!(2, frame.num_rows());
    /// # Ok::<(), odbc_cursor::Error>(())
    /// ```
    pub fn new<N>(columns: impl IntoIterator<Item = (N, HostVector)>) -> Result<Self, Error>
    where
        N: Into<String>,
    {
        let (names, columns): (Vec<String>, Vec<HostVector>) = columns
            .into_iter()
            .map(|(name, column)| (name.into(), column))
            .unzip();
        let num_rows = columns.first().map_or(0, HostVector::len);
        if let Some((index, column)) = columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != num_rows)
        {
            return Err(Error::MismatchedColumnLength {
                column: index,
                expected: num_rows,
                actual: column.len(),
            });
        }
        Ok(Self {
            names,
            columns,
            num_rows,
        })
    }

    /// A data frame without any columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Caller guarantees equal column lengths.
    pub(crate) fn from_parts(names: Vec<String>, columns: Vec<HostVector>) -> Self {
        let num_rows = columns.first().map_or(0, HostVector::len);
        Self {
            names,
            columns,
            num_rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// `true` if the frame has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[HostVector] {
        &self.columns
    }

    /// Zero based column index.
    pub fn column(&self, index: usize) -> &HostVector {
        &self.columns[index]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&HostVector> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| &self.columns[index])
    }
}
