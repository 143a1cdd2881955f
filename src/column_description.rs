use crate::FieldType;

/// Assumed maximum length of string columns, if the driver does not report one.
const UNKNOWN_STRING_LENGTH: usize = 255;

/// Describes the type and attributes of a result set column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnDescription {
    /// Column name. May be empty if unavailable.
    pub name: String,
    /// Type of the fields fetched from this column.
    pub data_type: FieldType,
    /// Indicates whether the column may contain `NULL` values.
    pub nullable: bool,
    /// Maximum length of string values in bytes, excluding the terminating zero. `None` if the
    /// data source did not report an upper bound or the column is not a string column.
    pub max_length: Option<usize>,
}

impl ColumnDescription {
    /// A nullable column without a known maximum length.
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Bytes needed to buffer a single value of this column, including its length/null indicator.
    pub fn element_size(&self) -> usize {
        let value = self.data_type.element_size().unwrap_or_else(|| {
            // Account for terminating zero
            self.max_length.unwrap_or(UNKNOWN_STRING_LENGTH) + 1
        });
        value + std::mem::size_of::<isize>()
    }
}
