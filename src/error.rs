use thiserror::Error as ThisError;

use crate::FieldType;

#[derive(Debug, ThisError)]
/// Error type used by cursors, queries and the host conversions.
///
/// Errors raised by the driver are passed through unchanged. Apart from the variants wrapping them
/// every variant describes a mistake of the caller, e.g. a value which can not be represented as a
/// field, or a call in the wrong state.
pub enum Error {
    /// Error reported by a driver implementation. Drivers which do not have an error type of their
    /// own, use this variant to report failure.
    #[error("The driver reported an error:\n{0}")]
    Driver(String),
    /// Error emitted by the ODBC driver manager or driver.
    #[cfg(feature = "odbc")]
    #[error(transparent)]
    Odbc(#[from] odbc_api::Error),
    /// A value of the host can not be represented as a field, or a value returned by the driver
    /// can not be converted into the type of its column.
    #[error("Unable to convert {value} into a value of type {target}.")]
    TypeConversion {
        /// Description of the offending value.
        value: String,
        /// Name of the type the value should have been converted to.
        target: &'static str,
    },
    /// The operation requires a state the cursor is not in. E.g. executing a cursor before
    /// preparing a statement.
    #[error("Invalid cursor state: {0}")]
    InvalidState(&'static str),
    #[error(
        "Number of passed parameters ({actual}) does not match the number required by the query \
        ({expected})."
    )]
    ParameterCount { expected: usize, actual: usize },
    /// The driver returned a field which does not match the type it announced for the column.
    #[error(
        "Column {column} has been described as {expected}, yet the driver returned a value of type \
        {actual}."
    )]
    ColumnTypeMismatch {
        /// Zero based column index.
        column: usize,
        expected: FieldType,
        actual: FieldType,
    },
    /// Columns of a data frame must all have the same number of elements.
    #[error("Column {column} has {actual} elements, but the data frame has {expected} rows.")]
    MismatchedColumnLength {
        /// Zero based column index.
        column: usize,
        expected: usize,
        actual: usize,
    },
}
